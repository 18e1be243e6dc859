//! # summary-infrastructure
//!
//! 核心抽象的具体实现：Redis与进程内的锁/限流/通道、PostgreSQL仓储、
//! HTTP文本生成客户端，以及指标与结构化日志。

pub mod database;
pub mod generation;
pub mod memory;
pub mod observability;
pub mod redis;

pub use database::*;
pub use generation::HttpSummaryGenerator;
pub use memory::{InMemoryChannel, InMemoryLock, InMemoryRateLimiter};
pub use observability::*;
pub use self::redis::{RedisConnection, RedisLock, RedisPubSubChannel, RedisRateLimiter};
