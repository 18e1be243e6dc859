pub mod http_generator;

pub use http_generator::HttpSummaryGenerator;
