pub mod app;
pub mod shutdown;

pub use app::{AppMode, Application, Components};
pub use shutdown::ShutdownManager;
