//! Test helper utilities

use std::time::Duration;

use tokio::time::sleep;

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        Self::wait_for_with_interval(&mut condition, timeout, Duration::from_millis(10)).await
    }

    /// Wait for a condition with a custom poll interval
    ///
    /// Uses tokio time, so it also works under a paused test clock.
    pub async fn wait_for_with_interval<F, Fut>(
        mut condition: F,
        timeout: Duration,
        poll_interval: Duration,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;

        while tokio::time::Instant::now() < deadline {
            if condition().await {
                return true;
            }
            sleep(poll_interval).await;
        }

        condition().await
    }
}
