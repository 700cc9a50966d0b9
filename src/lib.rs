//! Resimage - cache-backed remote image loading for two-slot views.
//!
//! This crate fetches images over HTTP, decodes them off the UI thread,
//! fits them into a bounding box with optional rounded corners and keeps
//! the results in a byte-bounded LRU cache shared by every view.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

/// Domain layer containing entities, errors, ports and the image pipeline.
pub mod domain;
/// Infrastructure layer containing cache, transport, codec and config.
pub mod infrastructure;
/// Presentation layer containing the image view.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "resimage";
