//! # Prepline - Dataset Preparation and Training Configuration
//!
//! Prepline stages uploaded tabular data, cleans it with a fixed
//! transformation pipeline, and assembles training configuration documents
//! for the cleaned result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use prepline::config::AppConfig;
//! use prepline::service::{Service, TransformRequest};
//!
//! # async fn example() -> prepline::error::Result<()> {
//! let service = Service::from_config(AppConfig::load(None)?)?;
//!
//! let bytes = std::fs::read("data.csv")?;
//! let ingest = service.ingest("data.csv".to_owned(), bytes).await?;
//! println!("Staged {} with {} columns", ingest.identifier, ingest.summary.column_count);
//!
//! let processed = service
//!     .transform(TransformRequest {
//!         identifier: ingest.identifier,
//!         filename: ingest.filename,
//!     })
//!     .await?;
//! println!("{} rows after cleaning", processed.report.output_rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`service`]: The three request operations (ingest, transform, configure)
//! - [`dataset`]: CSV decoding, column profiling and the cleaning pipeline
//! - [`training`]: Form field parsing and training configuration assembly
//! - [`staging`]: Keyed artifact storage shared between requests
//! - [`config`]: Application settings
//! - [`error`]: Error types and the serialized error response
//! - [`logging`]: Tracing subscriber setup
//!
//! ## Artifact Lifecycle
//!
//! An upload is stored once under a fresh identifier and never modified.
//! Processing writes a separate processed artifact next to it, and a
//! training configuration can only be assembled once that processed
//! artifact exists.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod service;
pub mod staging;
pub mod training;
