//! HTTP API
//!
//! Communication with the analysis service.

pub mod client;

pub use client::*;
