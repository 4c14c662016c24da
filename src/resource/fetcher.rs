//! Resource Fetcher
//!
//! Drives fetch → cache → parse → store for each resource kind, and fills in
//! router ports with one `lrp-list` per router.

use super::cache::{ResourceMap, SnapshotCache};
use super::model::Resource;
use super::parser::{parse_json, parse_output, text_parser};
use super::registry::{list_command, router_ports_command, ResourceKind, ROUTER_PORT_LISTING};
use crate::error::{IngestError, IngestResult};
use crate::ovn::CommandExecutor;
use std::collections::BTreeMap;

/// Replace `router`'s ports with the ones parsed from `ports_raw`.
///
/// Previously held ports are discarded, so repeating the call with the same
/// input leaves the same ports behind.
pub fn associate_ports<'a>(router: &'a mut Resource, ports_raw: &str) -> &'a [Resource] {
    if router.kind != ResourceKind::Router {
        tracing::warn!("Refusing to attach ports to non-router {}", router);
        return &router.ports;
    }

    let owner = (!router.id.is_empty()).then_some(router.id.as_str());

    let ports = if ROUTER_PORT_LISTING.json_supported {
        let mut ports = parse_json(ResourceKind::RouterPort, ports_raw);
        if let Some(owner) = owner {
            ports.iter_mut().for_each(|p| p.set_owner(owner));
        }
        ports
    } else {
        text_parser(ResourceKind::RouterPort)(ResourceKind::RouterPort, ports_raw, owner)
    };

    tracing::debug!("Associated {} ports with router {}", ports.len(), router.name);
    router.ports = ports;
    &router.ports
}

/// Fetch orchestrator
pub struct Fetcher<E> {
    executor: E,
    cache: SnapshotCache,
    json: bool,
    failures: BTreeMap<ResourceKind, IngestError>,
}

impl<E: CommandExecutor> Fetcher<E> {
    pub fn new(executor: E, cache: SnapshotCache) -> Self {
        Self {
            executor,
            cache,
            json: true,
            failures: BTreeMap::new(),
        }
    }

    /// Ask for JSON output where the kind supports it (default: on)
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SnapshotCache {
        &mut self.cache
    }

    /// Failures recorded by the most recent refresh, per kind
    pub fn failures(&self) -> &BTreeMap<ResourceKind, IngestError> {
        &self.failures
    }

    /// Run a command, treating blank output as a failure
    async fn run(&self, command: &[String]) -> IngestResult<String> {
        match self.executor.execute(command).await {
            Ok(output) if !output.trim().is_empty() => Ok(output),
            Ok(_) => Err(IngestError::command(command, "no output")),
            Err(e) => Err(IngestError::command(command, format!("{:#}", e))),
        }
    }

    async fn try_refresh_kind(&mut self, kind: ResourceKind) -> IngestResult<Vec<Resource>> {
        let command = list_command(kind, self.json);
        let raw = self.run(&command).await?;

        // Stored before parsing so unparseable output is kept for inspection
        self.cache.store_snapshot(kind, &raw);

        let resources = parse_output(kind, &raw, self.json);
        tracing::info!("Refreshed {} {} resources", resources.len(), kind);

        self.cache.update_live(kind, resources.clone());
        Ok(resources)
    }

    /// Refresh one kind. Failures are logged and yield an empty list.
    pub async fn refresh_kind(&mut self, kind: ResourceKind) -> Vec<Resource> {
        self.failures.remove(&kind);
        match self.try_refresh_kind(kind).await {
            Ok(resources) => resources,
            Err(e) => {
                tracing::warn!("Failed to refresh {}: {}", kind, e);
                self.failures.insert(kind, e);
                Vec::new()
            }
        }
    }

    /// Fetch and attach ports for every router, in order
    async fn attach_router_ports(&self, routers: &mut [Resource]) {
        for router in routers.iter_mut() {
            if router.id.is_empty() {
                tracing::debug!("Skipping port lookup for router without id: {}", router.name);
                router.ports.clear();
                continue;
            }

            let command = router_ports_command(&router.id);
            match self.run(&command).await {
                Ok(raw) => {
                    associate_ports(router, &raw);
                }
                Err(e) => {
                    tracing::warn!("Failed to list ports for router {}: {}", router.name, e);
                    router.ports.clear();
                }
            }
        }
    }

    /// Refresh routers and attach each one's ports
    pub async fn refresh_routers(&mut self) -> Vec<Resource> {
        let mut routers = self.refresh_kind(ResourceKind::Router).await;
        if !routers.is_empty() {
            self.attach_router_ports(&mut routers).await;
            self.cache.update_live(ResourceKind::Router, routers.clone());
        }
        routers
    }

    /// Refresh every kind in registry order.
    ///
    /// Always returns an entry for every kind; a failed kind maps to an
    /// empty list and its error is kept in [`Fetcher::failures`].
    pub async fn refresh_all(&mut self) -> ResourceMap {
        self.failures.clear();
        let mut result = ResourceMap::new();

        for kind in ResourceKind::ALL {
            let resources = match kind {
                ResourceKind::Router => self.refresh_routers().await,
                _ => self.refresh_kind(kind).await,
            };
            result.insert(kind, resources);
        }

        if !self.failures.is_empty() {
            tracing::warn!(
                "Refresh finished with {} failed kinds: {:?}",
                self.failures.len(),
                self.failures.keys().collect::<Vec<_>>()
            );
        }

        result
    }
}
