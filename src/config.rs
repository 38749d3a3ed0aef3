use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    #[serde(default = "default_gateway_model")]
    pub model: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            model: default_gateway_model(),
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

fn default_gateway_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_gateway_model() -> String {
    "anthropic/claude-3.5-sonnet".to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    60
}

impl GatewayConfig {
    /// Model slug, honoring the `OPERIUS_MODEL` environment override.
    pub fn resolved_model(&self) -> String {
        self.model_with_override(std::env::var("OPERIUS_MODEL").ok())
    }

    fn model_with_override(&self, requested: Option<String>) -> String {
        requested
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.model.clone())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    pub github: Option<GithubConnectorConfig>,
    pub kubernetes: Option<KubernetesConnectorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConnectorConfig {
    /// Repository in `owner/repo` form.
    pub repo: String,
    /// Branch to sync; defaults to the repository's default branch.
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_github_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Upper bound on files fetched per run, to stay under rate limits.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Number of recent commits ingested as commit-metadata documents.
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_github_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.rs".to_string(),
        "**/*.py".to_string(),
        "**/*.go".to_string(),
        "**/*.ts".to_string(),
        "**/*.js".to_string(),
        "**/*.yaml".to_string(),
        "**/*.yml".to_string(),
        "**/*.toml".to_string(),
        "**/*.json".to_string(),
        "**/Dockerfile".to_string(),
        "**/Makefile".to_string(),
    ]
}
fn default_max_files() -> usize {
    50
}
fn default_max_commits() -> usize {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct KubernetesConnectorConfig {
    /// kubeconfig context; defaults to the active context.
    #[serde(default)]
    pub context: Option<String>,
    /// Namespaces to include; empty means all namespaces.
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default = "default_k8s_kinds")]
    pub kinds: Vec<String>,
    #[serde(default = "default_kubectl_path")]
    pub kubectl_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_k8s_kinds() -> Vec<String> {
    vec![
        "namespaces".to_string(),
        "pods".to_string(),
        "services".to_string(),
        "deployments".to_string(),
        "configmaps".to_string(),
        "secrets".to_string(),
        "ingresses".to_string(),
    ]
}
fn default_kubectl_path() -> String {
    "kubectl".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.search.top_k == 0 {
        anyhow::bail!("search.top_k must be >= 1");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }

    if config.embedding.is_enabled() && config.embedding.dims == 0 {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified when provider is 'openai'");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or local.",
            other
        ),
    }

    if let Some(ref gh) = config.connectors.github {
        if !gh.repo.contains('/') {
            anyhow::bail!("connectors.github.repo must be in 'owner/repo' form");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cfg: Config = toml::from_str("[db]\npath = \"data/operius.sqlite\"\n").unwrap();
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.search.top_k, 10);
        assert!(cfg.connectors.github.is_none());
    }

    #[test]
    fn github_repo_validation() {
        let toml_str = r#"
[db]
path = "data/operius.sqlite"

[connectors.github]
repo = "not-a-repo"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operius.toml");
        std::fs::write(&path, toml_str).unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("owner/repo"));
    }

    #[test]
    fn model_override() {
        let gw = GatewayConfig::default();
        assert_eq!(gw.model_with_override(None), gw.model);
        assert_eq!(
            gw.model_with_override(Some("openai/gpt-4o-mini".to_string())),
            "openai/gpt-4o-mini"
        );
        // An empty override falls back to the configured model.
        assert_eq!(gw.model_with_override(Some(String::new())), gw.model);
    }
}
