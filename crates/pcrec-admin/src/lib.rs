//! pcrec Admin - command-line interface and sync daemon for the configuration store.
//!
//! This crate provides the binary that wires the store, the sync pipeline and
//! the scheduler together.

pub mod config;

pub use config::{Command, Config};
