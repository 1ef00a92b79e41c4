//! Carrier catalog module for the freight quoting engine.
//!
//! Combines the authoritative file-backed carrier catalog (`UTSFRegistry`) with
//! the slower document-store source (`DbCarrierSource`) via `CarrierResolver`'s
//! hot-switch merge rule.

pub mod db_source;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod utsf;

pub use db_source::{CacheBackedCarrierSource, DbCarrierSource};
pub use error::CarrierError;
pub use registry::UTSFRegistry;
pub use resolver::{resolve, ResolvedCarriers};
