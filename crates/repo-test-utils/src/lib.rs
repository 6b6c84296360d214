//! Shared test utilities for the rdf-repository-manager workspace.
//!
//! This crate provides standardised test fixtures to eliminate duplication
//! across test suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`manager`]: [`TestManager`], a local manager in a temporary directory
//! - [`factories`]: instrumented repository factories for observing
//!   construction, stalling initialization and failing shutdown

pub mod factories;
pub mod manager;

pub use factories::{BlockingFactory, CountingFactory, FailingShutdownFactory, Gate};
pub use manager::{TestManager, memory_config, proxy_config, readonly_config, sample_statement};
