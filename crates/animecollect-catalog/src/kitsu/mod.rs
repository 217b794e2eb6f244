pub mod client;
pub mod types;

pub use client::{KitsuCatalog, DEFAULT_BASE_URL};
