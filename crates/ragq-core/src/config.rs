//! Settings for the retrieval pipeline and its external services.
//!
//! Resolution order (later wins): built-in defaults, then the first settings
//! file found (`--config` path, `./ragq.toml`, `<config dir>/ragq/config.toml`),
//! then environment variables.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RetrievalError;
use crate::model::request::validate_alpha;

/// File name looked up in the working directory.
pub const PROJECT_SETTINGS_FILE: &str = "ragq.toml";

const REDACTED: &str = "***";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks placed in the prompt context. Retrieval fetches twice as many.
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
    /// Dense recall size N; BM25 reranks exactly these candidates.
    #[serde(default = "default_hybrid_candidates")]
    pub hybrid_candidates: usize,
    /// Dense weight in the fused score.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
    /// Ceiling for each upstream HTTP call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            retrieval_k: default_retrieval_k(),
            hybrid_candidates: default_hybrid_candidates(),
            hybrid_alpha: default_hybrid_alpha(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    /// Chunk count requested from the retriever: `retrieval_k` doubled.
    #[must_use]
    pub const fn overfetch_k(&self) -> usize {
        self.retrieval_k.saturating_mul(2)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_store_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_vector_store_url(),
            api_key: None,
            tenant: None,
            database: None,
            collection: default_collection(),
        }
    }
}

/// Credentials and identifiers checked once, before any query executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub embedding_api_key: String,
    pub store_api_key: String,
    pub tenant: String,
    pub database: String,
}

impl Settings {
    /// Apply environment overrides through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error when a numeric variable does not parse.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERVICE_NAME") {
            self.service.name = v;
        }
        if let Some(v) = get("APP_VERSION") {
            self.service.version = v;
        }

        if let Some(v) = get("RETRIEVAL_K") {
            self.retrieval.retrieval_k = parse_env("RETRIEVAL_K", &v)?;
        }
        if let Some(v) = get("HYBRID_CANDIDATES") {
            self.retrieval.hybrid_candidates = parse_env("HYBRID_CANDIDATES", &v)?;
        }
        if let Some(v) = get("HYBRID_ALPHA") {
            self.retrieval.hybrid_alpha = parse_env("HYBRID_ALPHA", &v)?;
        }
        if let Some(v) = get("BM25_K1") {
            self.retrieval.bm25_k1 = parse_env("BM25_K1", &v)?;
        }
        if let Some(v) = get("BM25_B") {
            self.retrieval.bm25_b = parse_env("BM25_B", &v)?;
        }
        if let Some(v) = get("RETRIEVAL_TIMEOUT_SECS") {
            self.retrieval.timeout_secs = parse_env("RETRIEVAL_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = get("OPENAI_API_KEY") {
            self.embedding.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            self.embedding.model = v;
        }

        if let Some(v) = get("CHROMA_URL") {
            self.vector_store.url = v;
        }
        if let Some(v) = get("CHROMA_API_KEY") {
            self.vector_store.api_key = Some(v);
        }
        if let Some(v) = get("CHROMA_TENANT") {
            self.vector_store.tenant = Some(v);
        }
        if let Some(v) = get("CHROMA_DATABASE") {
            self.vector_store.database = Some(v);
        }
        if let Some(v) = get("CHROMA_COLLECTION") {
            self.vector_store.collection = v;
        }

        Ok(())
    }

    /// Check value ranges. Does not require credentials.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] for out-of-range values.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        let r = &self.retrieval;
        if r.retrieval_k == 0 {
            return Err(RetrievalError::Config("retrieval_k must be at least 1".into()));
        }
        if r.hybrid_candidates == 0 {
            return Err(RetrievalError::Config(
                "hybrid_candidates must be at least 1".into(),
            ));
        }
        validate_alpha(r.hybrid_alpha).map_err(|_| {
            RetrievalError::Config(format!(
                "hybrid_alpha must be within [0, 1], got {}",
                r.hybrid_alpha
            ))
        })?;
        if !(r.bm25_k1.is_finite() && r.bm25_k1 >= 0.0) {
            return Err(RetrievalError::Config(format!(
                "bm25_k1 must be non-negative, got {}",
                r.bm25_k1
            )));
        }
        if !(0.0..=1.0).contains(&r.bm25_b) {
            return Err(RetrievalError::Config(format!(
                "bm25_b must be within [0, 1], got {}",
                r.bm25_b
            )));
        }
        if r.timeout_secs == 0 {
            return Err(RetrievalError::Config("timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Require every credential the external clients need.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] naming every missing variable.
    pub fn require_credentials(&self) -> Result<Credentials, RetrievalError> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let store_api_key = present(&self.vector_store.api_key);
        let tenant = present(&self.vector_store.tenant);
        let database = present(&self.vector_store.database);
        let embedding_api_key = present(&self.embedding.api_key);

        let mut missing = Vec::new();
        if store_api_key.is_none() {
            missing.push("CHROMA_API_KEY");
        }
        if tenant.is_none() {
            missing.push("CHROMA_TENANT");
        }
        if database.is_none() {
            missing.push("CHROMA_DATABASE");
        }
        if embedding_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }

        match (embedding_api_key, store_api_key, tenant, database) {
            (Some(embedding_api_key), Some(store_api_key), Some(tenant), Some(database)) => {
                Ok(Credentials {
                    embedding_api_key,
                    store_api_key,
                    tenant,
                    database,
                })
            }
            _ => Err(RetrievalError::Config(format!(
                "missing {}; set them in the environment, .env, or ragq.toml",
                missing.join(" / ")
            ))),
        }
    }

    /// Copy with secrets masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.embedding.api_key.is_some() {
            copy.embedding.api_key = Some(REDACTED.to_string());
        }
        if copy.vector_store.api_key.is_some() {
            copy.vector_store.api_key = Some(REDACTED.to_string());
        }
        copy
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value for {name} ('{raw}'): {e}"))
}

/// Load a settings file. A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Settings>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Per-user settings path: `<config dir>/ragq/config.toml`.
#[must_use]
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ragq").join("config.toml"))
}

/// Pick the settings file to read: explicit path, project file, then user file.
///
/// # Errors
///
/// Returns an error if an explicit path was given but does not exist.
pub fn settings_source(project_root: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("settings file {} does not exist", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let project = project_root.join(PROJECT_SETTINGS_FILE);
    if project.exists() {
        return Ok(Some(project));
    }

    Ok(user_settings_path().filter(|p| p.exists()))
}

/// Resolve effective settings from files and the process environment.
///
/// # Errors
///
/// Returns an error if a settings file fails to parse, an environment value is
/// malformed, or a value is out of range.
pub fn resolve_settings(project_root: &Path, explicit: Option<&Path>) -> Result<Settings> {
    resolve_settings_with(project_root, explicit, |name| std::env::var(name).ok())
}

/// [`resolve_settings`] with an injectable environment lookup.
///
/// # Errors
///
/// Same as [`resolve_settings`].
pub fn resolve_settings_with(
    project_root: &Path,
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = match settings_source(project_root, explicit)? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading settings file");
            load_settings_file(&path)?
        }
        None => Settings::default(),
    };

    settings.apply_env_overrides(lookup)?;
    settings.validate()?;
    Ok(settings)
}

fn default_service_name() -> String {
    "ragq".to_string()
}

const fn default_retrieval_k() -> usize {
    4
}

const fn default_hybrid_candidates() -> usize {
    200
}

const fn default_hybrid_alpha() -> f64 {
    0.7
}

const fn default_bm25_k1() -> f64 {
    1.5
}

const fn default_bm25_b() -> f64 {
    0.75
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vector_store_url() -> String {
    "https://api.trychroma.com".to_string()
}

fn default_collection() -> String {
    "documents".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_credentials() -> Vec<(&'static str, &'static str)> {
        vec![
            ("OPENAI_API_KEY", "sk-test"),
            ("CHROMA_API_KEY", "ck-test"),
            ("CHROMA_TENANT", "tenant-a"),
            ("CHROMA_DATABASE", "prod"),
        ]
    }

    #[test]
    fn missing_settings_file_uses_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        let cfg = load_settings_file(&root.path().join("absent.toml")).expect("load");
        assert_eq!(cfg.retrieval.retrieval_k, 4);
        assert_eq!(cfg.retrieval.hybrid_candidates, 200);
        assert!((cfg.retrieval.hybrid_alpha - 0.7).abs() < 1e-12);
        assert!((cfg.retrieval.bm25_k1 - 1.5).abs() < 1e-12);
        assert!((cfg.retrieval.bm25_b - 0.75).abs() < 1e-12);
        assert_eq!(cfg.embedding.model, "text-embedding-3-small");
        assert_eq!(cfg.retrieval.overfetch_k(), 8);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = root.path().join(PROJECT_SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"
[retrieval]
hybrid_alpha = 0.5

[vector_store]
collection = "handbook"
tenant = "acme"
"#,
        )
        .expect("write");

        let cfg = resolve_settings_with(root.path(), None, env_of(&[])).expect("resolve");
        assert!((cfg.retrieval.hybrid_alpha - 0.5).abs() < 1e-12);
        assert_eq!(cfg.retrieval.hybrid_candidates, 200);
        assert_eq!(cfg.vector_store.collection, "handbook");
        assert_eq!(cfg.vector_store.tenant.as_deref(), Some("acme"));
    }

    #[test]
    fn malformed_file_reports_path() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = root.path().join(PROJECT_SETTINGS_FILE);
        std::fs::write(&path, "[retrieval\nretrieval_k = ").expect("write");

        let err = resolve_settings_with(root.path(), None, env_of(&[])).unwrap_err();
        assert!(format!("{err:#}").contains("ragq.toml"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let root = tempfile::tempdir().expect("tempdir");
        let missing = root.path().join("nope.toml");
        let err = resolve_settings_with(root.path(), Some(&missing), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn env_overrides_file_values() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            root.path().join(PROJECT_SETTINGS_FILE),
            "[retrieval]\nretrieval_k = 6\n",
        )
        .expect("write");

        let cfg = resolve_settings_with(
            root.path(),
            None,
            env_of(&[
                ("RETRIEVAL_K", "3"),
                ("HYBRID_CANDIDATES", "50"),
                ("HYBRID_ALPHA", "0.25"),
                ("CHROMA_COLLECTION", "faq"),
            ]),
        )
        .expect("resolve");

        assert_eq!(cfg.retrieval.retrieval_k, 3);
        assert_eq!(cfg.retrieval.hybrid_candidates, 50);
        assert!((cfg.retrieval.hybrid_alpha - 0.25).abs() < 1e-12);
        assert_eq!(cfg.vector_store.collection, "faq");
    }

    #[test]
    fn unparseable_env_value_is_an_error() {
        let root = tempfile::tempdir().expect("tempdir");
        let err = resolve_settings_with(root.path(), None, env_of(&[("HYBRID_ALPHA", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("HYBRID_ALPHA"));
    }

    #[test]
    fn out_of_range_alpha_fails_validation() {
        let root = tempfile::tempdir().expect("tempdir");
        let err = resolve_settings_with(root.path(), None, env_of(&[("HYBRID_ALPHA", "1.2")]))
            .unwrap_err();
        assert!(err.to_string().contains("hybrid_alpha"));
    }

    #[test]
    fn credentials_report_every_missing_name() {
        let cfg = Settings::default();
        let err = cfg.require_credentials().unwrap_err();
        let msg = err.to_string();
        for name in ["CHROMA_API_KEY", "CHROMA_TENANT", "CHROMA_DATABASE", "OPENAI_API_KEY"] {
            assert!(msg.contains(name), "missing {name} in: {msg}");
        }
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let mut cfg = Settings::default();
        cfg.apply_env_overrides(env_of(&full_credentials())).expect("apply");
        cfg.vector_store.tenant = Some("   ".into());

        let err = cfg.require_credentials().unwrap_err();
        assert!(err.to_string().contains("CHROMA_TENANT"));
        assert!(!err.to_string().contains("CHROMA_DATABASE"));
    }

    #[test]
    fn credentials_resolve_when_present() {
        let mut cfg = Settings::default();
        cfg.apply_env_overrides(env_of(&full_credentials())).expect("apply");
        let creds = cfg.require_credentials().expect("complete credentials");
        assert_eq!(creds.tenant, "tenant-a");
        assert_eq!(creds.database, "prod");
    }

    #[test]
    fn redaction_masks_secrets_only() {
        let mut cfg = Settings::default();
        cfg.apply_env_overrides(env_of(&full_credentials())).expect("apply");
        let shown = cfg.redacted();
        assert_eq!(shown.embedding.api_key.as_deref(), Some(REDACTED));
        assert_eq!(shown.vector_store.api_key.as_deref(), Some(REDACTED));
        assert_eq!(shown.vector_store.tenant.as_deref(), Some("tenant-a"));
    }
}
