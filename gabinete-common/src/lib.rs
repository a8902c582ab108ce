//! # Gabinete Common Library
//!
//! Shared code for the gabinete submission service:
//! - Database initialization and record models
//! - SPARK checkpoint sections and their validation
//! - Configuration and data root resolution
//! - Text and timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod spark;
pub mod text;
pub mod time;

pub use error::{Error, Result};
pub use spark::{SectionName, SparkEntry, SparkSection};
