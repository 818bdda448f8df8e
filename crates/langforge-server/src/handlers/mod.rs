//! HTTP handler functions, one module per endpoint group.

pub mod generate;
