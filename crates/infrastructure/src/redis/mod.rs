//! Redis后端：分布式锁、滑动窗口限流器和Pub/Sub通道
//!
//! 所有跨进程的变更操作都在服务端以单条命令或Lua脚本原子执行。

pub mod connection;
pub mod lock;
pub mod pubsub;
pub mod rate_limiter;
pub mod scripts;

pub use connection::RedisConnection;
pub use lock::RedisLock;
pub use pubsub::RedisPubSubChannel;
pub use rate_limiter::RedisRateLimiter;
