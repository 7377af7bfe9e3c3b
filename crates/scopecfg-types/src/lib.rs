//! Shared types, adapter traits, and core utilities for the scopecfg settings engine.
//!
//! This crate contains the foundational types that are shared between the
//! resolution core and the storage adapter implementations, so adapters can be
//! compiled without pulling in the service layer.

pub mod audit;
pub mod capability;
pub mod error;
pub mod prelude;
pub mod settings_adapter;
pub mod types;

// vim: ts=4
