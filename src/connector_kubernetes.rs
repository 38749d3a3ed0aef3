//! Kubernetes cluster connector.
//!
//! Runs read-only `kubectl get <kind> -o json` list operations against the
//! active kubeconfig context (or a configured one) and turns every resource
//! into a raw record. Secret data values are redacted before the manifest
//! is stored.
//!
//! The cursor is the list resourceVersion of the final list call. It is
//! recorded for reporting only; resourceVersion comparisons are not ordered
//! in the Kubernetes API contract, so lists are always refetched in full
//! and the idempotent upsert absorbs the re-fetch.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::warn;

use crate::config::KubernetesConnectorConfig;
use crate::connector::{Connector, FetchBatch};
use crate::error::ConnectorError;
use crate::models::RawRecord;

pub struct KubernetesConnector {
    config: KubernetesConnectorConfig,
}

impl KubernetesConnector {
    pub fn new(config: KubernetesConnectorConfig) -> Self {
        Self { config }
    }

    /// Run one `kubectl get` and parse the JSON list it prints.
    async fn kubectl_list(
        &self,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Value, ConnectorError> {
        let mut cmd = Command::new(&self.config.kubectl_path);
        cmd.arg("get").arg(kind).arg("-o").arg("json");

        if let Some(ref context) = self.config.context {
            cmd.arg("--context").arg(context);
        }

        if kind == "namespaces" {
            // cluster-scoped
        } else if let Some(ns) = namespace {
            cmd.arg("-n").arg(ns);
        } else {
            cmd.arg("--all-namespaces");
        }

        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| {
            ConnectorError::Unavailable(format!(
                "kubectl get {} timed out after {}s",
                kind, self.config.timeout_secs
            ))
        })?
        .map_err(|e| {
            ConnectorError::Unavailable(format!(
                "failed to execute '{}': {}. Is kubectl installed?",
                self.config.kubectl_path, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_kubectl_error(stderr.trim()));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ConnectorError::Unavailable(format!("bad kubectl JSON for {}: {}", kind, e))
        })
    }

    fn namespaces_to_query(&self, kind: &str) -> Vec<Option<String>> {
        if kind == "namespaces" || self.config.namespaces.is_empty() {
            vec![None]
        } else {
            self.config
                .namespaces
                .iter()
                .cloned()
                .map(Some)
                .collect()
        }
    }
}

#[async_trait]
impl Connector for KubernetesConnector {
    fn name(&self) -> &str {
        "kubernetes"
    }

    fn description(&self) -> &str {
        "List pods, services, deployments, and other resources via kubectl"
    }

    async fn fetch(&self, _since: Option<&str>) -> Result<FetchBatch, ConnectorError> {
        let mut records = Vec::new();
        let mut last_resource_version: Option<String> = None;

        for kind in &self.config.kinds {
            for namespace in self.namespaces_to_query(kind) {
                let list = self.kubectl_list(kind, namespace.as_deref()).await?;

                if let Some(rv) = list
                    .pointer("/metadata/resourceVersion")
                    .and_then(|v| v.as_str())
                {
                    last_resource_version = Some(rv.to_string());
                }

                let items = list
                    .get("items")
                    .and_then(|i| i.as_array())
                    .cloned()
                    .unwrap_or_default();

                for item in items {
                    match resource_record(&item) {
                        Some(record) => records.push(record),
                        None => {
                            warn!(kind = %kind, "skipping resource with no name");
                        }
                    }
                }
            }
        }

        Ok(FetchBatch {
            records,
            next_ref: last_resource_version,
        })
    }
}

/// Build a raw record from one resource manifest. Returns `None` when the
/// manifest has no name (nothing stable to key the document on).
fn resource_record(item: &Value) -> Option<RawRecord> {
    let metadata = item.get("metadata")?;
    let name = metadata.get("name")?.as_str()?.to_string();

    let kind = item
        .get("kind")
        .and_then(|k| k.as_str())
        .unwrap_or("Unknown")
        .to_string();

    let namespace = metadata
        .get("namespace")
        .and_then(|n| n.as_str())
        .map(str::to_string);

    let labels: BTreeMap<String, String> = metadata
        .get("labels")
        .and_then(|l| l.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let manifest = if kind == "Secret" {
        redact_secret(item.clone())
    } else {
        item.clone()
    };

    Some(RawRecord::K8sResource {
        kind,
        name,
        namespace,
        api_version: item
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("v1")
            .to_string(),
        labels,
        manifest_json: serde_json::to_string_pretty(&manifest).unwrap_or_default(),
        resource_version: metadata
            .get("resourceVersion")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        uid: metadata
            .get("uid")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

/// Replace every secret data value with a placeholder before storage.
fn redact_secret(mut manifest: Value) -> Value {
    if let Some(data) = manifest.get_mut("data").and_then(|d| d.as_object_mut()) {
        for value in data.values_mut() {
            *value = Value::String("[REDACTED]".to_string());
        }
    }
    manifest
}

/// Map kubectl stderr onto the connector error taxonomy.
fn classify_kubectl_error(stderr: &str) -> ConnectorError {
    let lower = stderr.to_lowercase();
    if lower.contains("unauthorized") || lower.contains("you must be logged in") {
        ConnectorError::Auth(format!("cluster rejected credentials: {}", stderr))
    } else if lower.contains("forbidden") {
        ConnectorError::Auth(format!("cluster access forbidden: {}", stderr))
    } else {
        ConnectorError::Unavailable(format!("kubectl failed: {}", stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_manifest() -> Value {
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "nginx-1",
                "namespace": "default",
                "resourceVersion": "12345",
                "uid": "abc-123",
                "labels": {"app": "nginx"}
            },
            "status": {"phase": "Running"}
        })
    }

    #[test]
    fn test_resource_record_fields() {
        let record = resource_record(&pod_manifest()).unwrap();
        match record {
            RawRecord::K8sResource {
                kind,
                name,
                namespace,
                labels,
                resource_version,
                ..
            } => {
                assert_eq!(kind, "Pod");
                assert_eq!(name, "nginx-1");
                assert_eq!(namespace.as_deref(), Some("default"));
                assert_eq!(labels.get("app").map(String::as_str), Some("nginx"));
                assert_eq!(resource_version, "12345");
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_resource_record_requires_name() {
        let manifest = serde_json::json!({"kind": "Pod", "metadata": {}});
        assert!(resource_record(&manifest).is_none());
    }

    #[test]
    fn test_secret_data_redacted() {
        let secret = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": "db-creds", "namespace": "default"},
            "data": {"password": "aHVudGVyMg=="}
        });
        let record = resource_record(&secret).unwrap();
        if let RawRecord::K8sResource { manifest_json, .. } = record {
            assert!(manifest_json.contains("[REDACTED]"));
            assert!(!manifest_json.contains("aHVudGVyMg=="));
        } else {
            panic!("expected k8s record");
        }
    }

    #[test]
    fn test_classify_unauthorized() {
        let err = classify_kubectl_error("error: You must be logged in to the server (Unauthorized)");
        assert!(matches!(err, ConnectorError::Auth(_)));
    }

    #[test]
    fn test_classify_unreachable() {
        let err = classify_kubectl_error(
            "The connection to the server localhost:8080 was refused - did you specify the right host or port?",
        );
        assert!(matches!(err, ConnectorError::Unavailable(_)));
    }
}
