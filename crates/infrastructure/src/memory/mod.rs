//! 进程内后端
//!
//! 单进程部署（`store.backend = "memory"`）以及测试使用，语义与Redis后端一致。

pub mod channel;
pub mod lock;
pub mod rate_limiter;

pub use channel::InMemoryChannel;
pub use lock::InMemoryLock;
pub use rate_limiter::InMemoryRateLimiter;
