//! xlmeta Common - Shared types and utilities
//!
//! This crate provides the error type, checksum helpers and tool
//! configuration shared by the metadata codec and its tooling.

pub mod checksum;
pub mod config;
pub mod error;

pub use checksum::{ChecksumStatus, metadata_checksum};
pub use config::Config;
pub use error::{Error, Result};
