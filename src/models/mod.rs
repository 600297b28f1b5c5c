// src/models/mod.rs

//! Domain models for the class checker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod report;
mod section;

// Re-export all public types
pub use config::{
    CatalogConfig, CatalogVariant, Config, MailConfig, MailTransport, ReconcileConfig,
    TokenConfig,
};
pub use report::{Outcome, PassReport, SectionReport};
pub use section::{AvailabilityStatus, SectionId, TrackedSection};
