//! Connector registry: builds the configured connectors and describes
//! them for the `sources` command.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::connector::Connector;
use crate::connector_github::GithubConnector;
use crate::connector_kubernetes::KubernetesConnector;
use crate::models::Source;

/// One configured source, paired with its connector.
pub struct RegisteredSource {
    pub source: Source,
    pub connector: Box<dyn Connector>,
}

/// Instantiate connectors for every source present in the config.
///
/// A source absent from the config is simply not registered; asking to
/// sync it is an error surfaced by [`connector_for`].
pub fn build_connectors(config: &Config) -> Result<Vec<RegisteredSource>> {
    let mut sources = Vec::new();

    if let Some(github) = &config.connectors.github {
        let connector =
            GithubConnector::new(github.clone()).context("failed to build github connector")?;
        sources.push(RegisteredSource {
            source: Source::Github,
            connector: Box::new(connector),
        });
    }

    if let Some(kubernetes) = &config.connectors.kubernetes {
        sources.push(RegisteredSource {
            source: Source::Kubernetes,
            connector: Box::new(KubernetesConnector::new(kubernetes.clone())),
        });
    }

    Ok(sources)
}

/// Find the registered connector for one source.
pub fn connector_for(sources: &[RegisteredSource], source: Source) -> Result<&dyn Connector> {
    sources
        .iter()
        .find(|s| s.source == source)
        .map(|s| s.connector.as_ref())
        .with_context(|| {
            format!(
                "source '{}' is not configured; add a [connectors.{}] section to the config",
                source, source
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectorsConfig, KubernetesConnectorConfig};

    fn config_with_k8s_only() -> Config {
        let mut config: Config = toml::from_str("[db]\npath = \"test.db\"\n").unwrap();
        config.connectors = ConnectorsConfig {
            github: None,
            kubernetes: Some(toml::from_str::<KubernetesConnectorConfig>("").unwrap()),
        };
        config
    }

    #[test]
    fn test_unconfigured_source_is_not_registered() {
        let sources = build_connectors(&config_with_k8s_only()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source, Source::Kubernetes);
        assert!(connector_for(&sources, Source::Github).is_err());
    }
}
