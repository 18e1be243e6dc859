pub mod pool;
pub mod postgres;

pub use pool::{connect_pool, health_check, run_migrations};
pub use postgres::PostgresSummaryRepository;
