//! Httptrap - Recording fake HTTP endpoint for integration tests
//!
//! Serves a configurable canned response while capturing every request it
//! receives, so test code can assert on method, headers, query parameters
//! and body after the fact.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::multiple_crate_versions
)]

pub mod capture;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod server;

pub use capture::{CaptureSequence, RequestRecord};
pub use endpoint::{recording_endpoint, EndpointBuilder, RecordingHandler, Responder};
pub use error::{HttptrapError, Result};
pub use server::{start, ServerHandle, ServerOptions};
