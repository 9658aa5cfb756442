//! Exchange adapters
//!
//! Implementations of the port traits against the real exchange.

pub mod clob_rest;

pub use clob_rest::{ClobRestClient, RestError};
