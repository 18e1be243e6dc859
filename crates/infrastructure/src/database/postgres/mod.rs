pub mod postgres_summary_repository;

pub use postgres_summary_repository::PostgresSummaryRepository;
