//! ovnscope - typed snapshots of the OVN northbound database
//!
//! - [`resource`] - registry, parsing engine, snapshot cache and fetcher
//! - [`ovn`] - command execution against the northbound database
//! - [`config`] - persistent configuration
//! - [`error`] - ingestion error taxonomy

pub mod config;
pub mod error;
pub mod ovn;
pub mod resource;

pub use error::{IngestError, IngestResult};
