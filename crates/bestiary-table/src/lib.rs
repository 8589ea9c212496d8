//! Extraction of the collateral adjective table found on Wikipedia's
//! "List of animal names" page.
//!
//! The entry point is [`extract`], which turns an HTML snapshot into a [`Catalog`]:
//! adjective groups in table order, each referencing deduplicated [`AnimalEntry`]
//! values through [`AnimalId`] handles.

mod catalog;
mod cell;
mod config;
mod error;
mod extract;
mod grid;

pub use catalog::{slugify, AdjectiveGroup, AnimalEntry, AnimalId, Catalog, DownloadStatus};
pub use config::ExtractConfig;
pub use error::StructureError;
pub use extract::extract;
