//! Resource abstraction layer
//!
//! This module turns raw `ovn-nbctl` output into typed northbound resources
//! and keeps the latest known state on disk.
//!
//! # Architecture
//!
//! - [`registry`] - Static table of resource kinds and their list commands
//! - [`model`] - The [`Resource`] record and its typed per-kind views
//! - [`parser`] - JSON repair/extraction and table/line text parsing
//! - [`cache`] - Archival and latest snapshots per kind, plus the live view
//! - [`fetcher`] - Refresh orchestration and router port association
//!
//! # Example
//!
//! ```ignore
//! use ovnscope::ovn::KubectlExecutor;
//! use ovnscope::resource::{Fetcher, ResourceKind, SnapshotCache};
//!
//! async fn list_routers(executor: KubectlExecutor) -> Vec<ovnscope::resource::Resource> {
//!     let cache = SnapshotCache::new(SnapshotCache::default_root());
//!     let mut fetcher = Fetcher::new(executor, cache);
//!     fetcher.refresh_kind(ResourceKind::Router).await
//! }
//! ```

pub mod cache;
pub mod fetcher;
pub mod model;
pub mod parser;
pub mod registry;

pub use cache::{ResourceMap, SnapshotCache};
pub use fetcher::{associate_ports, Fetcher};
pub use model::{FieldMap, Resource, ResourceView};
pub use parser::{normalize_json, parse_json, parse_output, parse_text, try_parse_json};
pub use registry::{describe, list_command, router_ports_command, ResourceDescriptor, ResourceKind};
