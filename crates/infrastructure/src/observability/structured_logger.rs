//! Structured logging utilities
//!
//! 调度与分发过程中的领域事件，字段名保持稳定以便日志检索。

use std::time::Duration;

use summary_core::{SchedulerError, SummaryKind, WorkUnit};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_work_published(channel: &str, unit: &WorkUnit) {
        debug!(
            event = "work_published",
            channel = channel,
            user_id = unit.user_id,
            period = %unit.period,
            kind = unit.period.kind().as_str(),
            "Work message published"
        );
    }

    pub fn log_tick_completed(
        job: &str,
        kind: SummaryKind,
        users: usize,
        published: usize,
        failures: usize,
        elapsed: Duration,
    ) {
        info!(
            event = "tick_completed",
            job = job,
            kind = kind.as_str(),
            users = users,
            published = published,
            failures = failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "Scheduler tick completed"
        );
    }

    pub fn log_work_skipped_locked(lock_key: &str) {
        info!(
            event = "work_skipped_locked",
            lock_key = lock_key,
            "Work unit is already being processed elsewhere, skipping"
        );
    }

    pub fn log_work_completed(unit: &WorkUnit, elapsed: Duration) {
        info!(
            event = "work_completed",
            user_id = unit.user_id,
            period = %unit.period,
            kind = unit.period.kind().as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Summary generated and saved"
        );
    }

    pub fn log_work_failed(lock_key: &str, error: &SchedulerError) {
        error!(
            event = "work_failed",
            lock_key = lock_key,
            error.kind = error.kind(),
            error.message = %error,
            "Summary job failed"
        );
    }

    pub fn log_lock_release_failed(lock_key: &str, error: &SchedulerError) {
        warn!(
            event = "lock_release_failed",
            lock_key = lock_key,
            error.message = %error,
            "Failed to release lock, it will expire by TTL"
        );
    }

    pub fn log_system_error(component: &str, operation: &str, error: &SchedulerError) {
        error!(
            event = "system_error",
            error.component = component,
            error.operation = operation,
            error.kind = error.kind(),
            error.message = %error,
            "System error occurred"
        );
    }
}
