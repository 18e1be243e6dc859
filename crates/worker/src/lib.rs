//! # summary-worker
//!
//! 订阅工作消息通道，在有界并发下以分布式锁保护每个工作单元的摘要生成。

pub mod dispatcher;
pub mod settings;

pub use dispatcher::{ProcessOutcome, SummaryDispatcher};
pub use settings::DispatcherSettings;
