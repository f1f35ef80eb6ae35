//! Chunked cleaning and validation of hospital price-transparency files.
//!
//! [`cleaning::CleaningJob`] streams an extracted flat file in fixed-size
//! batches, normalizes and validates each batch, writes the clean rows and a
//! violations report, and records a transparency score in the run report.

pub mod cleaning;
pub mod config;
pub mod error;
pub mod telemetry;
