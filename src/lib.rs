// src/lib.rs

//! UMich Class Checker Library
//!
//! Tracks course sections for subscribers and mails them when a section's
//! open/closed status flips.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(feature = "lambda")]
pub mod lambda;
