//! # summary-scheduler
//!
//! 周期性扫描缺失摘要的工作单元，并把工作消息发布到通道。

pub mod scheduler;

pub use scheduler::{SummaryScheduler, TickReport};
