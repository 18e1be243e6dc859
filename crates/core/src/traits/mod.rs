//! 核心组件与外部协作方的抽象接口

pub mod channel;
pub mod generator;
pub mod lock;
pub mod rate_limiter;
pub mod repository;

pub use channel::*;
pub use generator::*;
pub use lock::*;
pub use rate_limiter::*;
pub use repository::*;
