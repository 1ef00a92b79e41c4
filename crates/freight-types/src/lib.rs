//! Common types module for the freight quoting engine.
//!
//! This module defines the core data types and structures used throughout
//! the quoting pipeline. It provides a centralized location for shared types
//! to ensure consistency across all engine components.

/// HTTP API request/response types and the unified error type.
pub mod api;
/// Carrier pricing contracts and serviceability data.
pub mod carrier;
/// Pincode and zone primitives.
pub mod domain;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Quote, charge breakdown, and Smart Shield flag types.
pub mod quote;
/// Shipment and box dimension types.
pub mod shipment;
/// Storage keys for cache namespaces.
pub mod storage;
/// Small shared helpers (rounding, timestamps).
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use carrier::*;
pub use domain::*;
pub use quote::*;
pub use registry::ImplementationRegistry;
pub use shipment::*;
pub use storage::StorageKey;
pub use utils::{current_timestamp, round_half_up};
pub use validation::*;
