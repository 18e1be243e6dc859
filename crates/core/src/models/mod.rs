//! # 数据模型
//!
//! 摘要任务调度的核心数据结构：工作消息、日历周期、周期任务描述、锁租约与限流结果。
//!
//! ```text
//! Scheduler ──WorkMessage──▶ channel ──▶ Dispatcher ──lock_key()──▶ Lock
//! ```

pub mod job;
pub mod lock;
pub mod message;
pub mod period;
pub mod rate_limit;

pub use job::*;
pub use lock::*;
pub use message::*;
pub use period::*;
pub use rate_limit::*;
