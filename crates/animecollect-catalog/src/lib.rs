//! Read-only anime catalog providers.

pub mod demo;
pub mod error;
pub mod kitsu;
pub mod traits;

pub use demo::DemoCatalog;
pub use error::CatalogError;
pub use kitsu::KitsuCatalog;
pub use traits::{CatalogAnime, CatalogCategory, CatalogEpisode, CatalogProvider};
