//! # summary-core
//!
//! 日记摘要后台任务的核心定义：错误类型、配置、数据模型，以及锁、限流器、
//! 发布/订阅通道、关系型存储和文本生成服务的抽象接口。

pub mod config;
pub mod errors;
pub mod login_limiter;
pub mod models;
pub mod traits;

pub use errors::*;
pub use login_limiter::LoginAttemptLimiter;
pub use models::{
    JobState, LockLease, RateLimitDecision, ScheduledJobDescriptor, SummaryKind, SummaryPeriod,
    WorkMessage, WorkUnit,
};
pub use traits::{
    acquire_with_retry, DistributedLock, MessageChannel, PayloadStream, RateLimiter,
    SummaryGenerator, SummaryRepository,
};
