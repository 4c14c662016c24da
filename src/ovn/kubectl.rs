//! kubectl-backed command execution
//!
//! Locates the northbound database pod by label selector (optionally pinned
//! to a node) and runs commands in its nbdb container.

use super::CommandExecutor;
use crate::config::ConnectionConfig;
use crate::error::excerpt;
use anyhow::{Context, Result};
use serde_json::Value;
use std::process::Output;
use tokio::process::Command;

/// Executes northbound commands through `kubectl exec`
#[derive(Debug, Clone)]
pub struct KubectlExecutor {
    config: ConnectionConfig,
    kubectl: String,
}

impl KubectlExecutor {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            kubectl: "kubectl".to_string(),
        }
    }

    /// Use a different kubectl binary (e.g. `oc`)
    pub fn with_binary(mut self, binary: &str) -> Self {
        self.kubectl = binary.to_string();
        self
    }

    /// Leading arguments shared by every kubectl call
    fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref kubeconfig) = self.config.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args.push("-n".to_string());
        args.push(self.config.namespace.clone());
        args
    }

    /// Arguments for listing candidate pods
    pub fn list_pods_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "get".to_string(),
            "pods".to_string(),
            "-l".to_string(),
            self.config.label_selector.clone(),
            "-o".to_string(),
            "json".to_string(),
        ]);
        args
    }

    /// Arguments for running `command` in the nbdb container of `pod`
    pub fn exec_args(&self, pod: &str, command: &[String]) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "exec".to_string(),
            pod.to_string(),
            "-c".to_string(),
            self.config.container.clone(),
            "--".to_string(),
        ]);
        args.extend(command.iter().cloned());
        args
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        tracing::info!("Executing: {} {}", self.kubectl, args.join(" "));

        let output = Command::new(&self.kubectl)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.kubectl))?;

        check_output(&self.kubectl, output)
    }

    /// Find the northbound database pod
    pub async fn find_nbdb_pod(&self) -> Result<String> {
        let listing = self.run(&self.list_pods_args()).await?;
        let pods: Value = serde_json::from_str(&listing).context("Failed to parse pod listing")?;

        select_pod(&pods, self.config.node_name.as_deref()).with_context(|| {
            format!(
                "No pods found with label selector '{}' in namespace '{}'",
                self.config.label_selector, self.config.namespace
            )
        })
    }
}

impl CommandExecutor for KubectlExecutor {
    async fn execute(&self, args: &[String]) -> Result<String> {
        let pod = self.find_nbdb_pod().await?;
        tracing::info!(
            "Executing command in pod '{}', container '{}'",
            pod,
            self.config.container
        );
        self.run(&self.exec_args(&pod, args)).await
    }
}

fn check_output(binary: &str, output: Output) -> Result<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!("{} failed: {} - {}", binary, output.status, excerpt(&stderr));
        return Err(anyhow::anyhow!(
            "{} exited with {}",
            binary,
            output.status.code().unwrap_or(-1)
        ));
    }

    Ok(stdout)
}

/// Pick a pod from a `kubectl get pods -o json` listing.
///
/// Prefers the pod scheduled on `node_name`; otherwise the first pod.
pub fn select_pod(listing: &Value, node_name: Option<&str>) -> Option<String> {
    let pods = listing.get("items")?.as_array()?;

    let name_of = |pod: &Value| {
        pod.get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    if let Some(node) = node_name {
        let on_node = pods.iter().find(|pod| {
            pod.get("spec")
                .and_then(|s| s.get("nodeName"))
                .and_then(Value::as_str)
                == Some(node)
        });
        match on_node {
            Some(pod) => {
                let name = name_of(pod);
                tracing::info!("Found pod {:?} on node '{}'", name, node);
                return name;
            }
            None => {
                tracing::warn!("No pod found on node '{}', using first available pod", node);
            }
        }
    }

    pods.first().and_then(name_of)
}
