pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod expand;
pub mod form;
pub mod import;
pub mod match_log;
pub mod persist;
pub mod pipeline;
pub mod staleness;
