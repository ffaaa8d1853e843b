//! Test harness for the line view engine
//!
//! Provides infrastructure for driving the engine end to end without a
//! rendering host or backend process.
//!
//! # Modules
//!
//! - `headless`: in-memory view host with a mock backend and manual clock
//! - `assertions`: common test assertions
//! - `fixtures`: test fixture helpers

pub mod assertions;
pub mod fixtures;
pub mod headless;

pub use fixtures::MockBackend;
pub use headless::TestView;
