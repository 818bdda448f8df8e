//! HTTP service and pipeline orchestration for langforge.
//!
//! Turns a submitted language description into a built interpreter package
//! by driving the generate -> validate -> build -> finalize pipeline, and
//! exposes submission, status polling, and termination over HTTP.

pub mod builder;
pub mod config;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod pipeline;
pub mod router;
pub mod runner;
pub mod schema;
pub mod state;
