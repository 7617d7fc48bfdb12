use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub documents: DocumentsConfig,
    pub parser: ParserConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub server: ServerConfig,
}

/// Where source documents live and how sidecar artifacts are named.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    /// Root of the document tree (populated by upload or externally).
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Appended to a document path to form its sidecar path.
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}

fn default_sidecar_suffix() -> String {
    ".json".to_string()
}

/// External parsing service endpoint and worker pacing.
#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    /// Base URL of the parsing service.
    pub url: String,
    pub username: String,
    pub token: String,
    /// Remote folder that parse results are written under.
    #[serde(default = "default_result_dir")]
    pub result_dir: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between documents in the worker loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Sleep when no documents are tracked.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
}

fn default_result_dir() -> String {
    "result".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_idle_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Minimum shared-substring length (characters) to report.
    #[serde(default = "default_min_match_len")]
    pub min_match_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_match_len: default_min_match_len(),
        }
    }
}

fn default_min_match_len() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.engine.min_match_len == 0 {
        anyhow::bail!("engine.min_match_len must be > 0");
    }

    if config.documents.sidecar_suffix.is_empty() {
        anyhow::bail!("documents.sidecar_suffix must not be empty");
    }

    if config.parser.url.is_empty() {
        anyhow::bail!("parser.url must be set");
    }

    // The remote service resolves result paths relative to its own root.
    if config.parser.result_dir.starts_with('/') {
        anyhow::bail!("parser.result_dir must not start with '/'");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ovscan.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let (_tmp, path) = write_config(
            r#"
[documents]
root = "uploads"

[parser]
url = "http://parser.local/"
username = "woodpecker"
token = "111"

[server]
bind = "127.0.0.1:8000"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.documents.include_globs, vec!["**/*.pdf"]);
        assert_eq!(config.documents.sidecar_suffix, ".json");
        assert_eq!(config.parser.result_dir, "result");
        assert_eq!(config.parser.poll_interval_ms, 500);
        assert_eq!(config.engine.min_match_len, 4);
    }

    #[test]
    fn rejects_absolute_result_dir() {
        let (_tmp, path) = write_config(
            r#"
[documents]
root = "uploads"

[parser]
url = "http://parser.local/"
username = "u"
token = "t"
result_dir = "/result"

[server]
bind = "127.0.0.1:8000"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("result_dir"));
    }

    #[test]
    fn rejects_zero_min_match_len() {
        let (_tmp, path) = write_config(
            r#"
[documents]
root = "uploads"

[parser]
url = "http://parser.local/"
username = "u"
token = "t"

[engine]
min_match_len = 0

[server]
bind = "127.0.0.1:8000"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
