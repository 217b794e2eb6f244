pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod stats;
pub mod storage;
pub mod validate;
