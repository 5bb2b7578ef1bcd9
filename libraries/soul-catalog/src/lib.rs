//! Soul Player Catalog Client
//!
//! HTTP implementation of [`soul_queue::CatalogClient`].
//!
//! # Features
//!
//! - **Batch metadata**: `GET /api/song/detail?ids=1,2,3`
//! - **Stream resolution**: `GET /api/song/url?id=ID&level=QUALITY`
//! - **Abuse classification**: HTTP 429 and configured body codes surface as
//!   [`soul_queue::CatalogError::Abuse`] so the queue can pause background work
//!
//! # Example
//!
//! ```ignore
//! use soul_catalog::{CatalogConfig, HttpCatalogClient};
//! use soul_queue::{QueueConfig, QueueOrchestrator};
//! use std::sync::Arc;
//!
//! let config = CatalogConfig::new("https://music.example.com").with_cookie("MUSIC_U=...");
//! let catalog = Arc::new(HttpCatalogClient::new(config)?);
//! let queue = QueueOrchestrator::new(catalog, controller, QueueConfig::default());
//! ```

mod client;
mod error;
mod types;

pub use client::HttpCatalogClient;
pub use error::{CatalogClientError, Result};
pub use types::CatalogConfig;
