//! API schema types, one module per endpoint group.

pub mod generate;
