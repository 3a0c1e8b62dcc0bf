//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_RETRIEVAL__ALPHA=0.7`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::geo::SpatialRelation;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path));
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already-assembled figment (tests, embedding callers).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> crate::error::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Typed view of the whole configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub timeouts: TimeoutSettings,
    pub geocoder: GeocoderSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.alpha) {
            return Err(Error::InvalidConfig(format!("retrieval.alpha must be in [0, 1], got {}", r.alpha)));
        }
        if r.default_top_k == 0 || r.default_top_k > r.max_top_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval.default_top_k must be in 1..={}, got {}",
                r.max_top_k, r.default_top_k
            )));
        }
        if r.candidate_pool == 0 {
            return Err(Error::InvalidConfig("retrieval.candidate_pool must be positive".into()));
        }
        if let Some(min) = r.min_similarity {
            if !(-1.0..=1.0).contains(&min) {
                return Err(Error::InvalidConfig(format!("retrieval.min_similarity must be in [-1, 1], got {min}")));
            }
        }
        let t = &self.timeouts;
        for (name, ms) in [("geocode_ms", t.geocode_ms), ("embed_ms", t.embed_ms), ("generate_ms", t.generate_ms), ("intent_ms", t.intent_ms)] {
            if ms == 0 {
                return Err(Error::InvalidConfig(format!("timeouts.{name} must be positive")));
            }
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Memory,
    Lancedb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    /// Directory of harvested `*.json` / `*.jsonl` dataset records.
    pub records_dir: String,
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            records_dir: "data/records".to_string(),
            lancedb_dir: "data/indexes/lancedb".to_string(),
            table: "datasets".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialScoring {
    /// 1 for a match, 0 otherwise.
    #[default]
    Binary,
    /// Fraction of the footprint envelope covered by the query area.
    OverlapRatio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Weight of the spatial score in the combined score.
    pub alpha: f32,
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// Number of semantic neighbours fetched before merging.
    pub candidate_pool: usize,
    pub relation: SpatialRelation,
    pub spatial_scoring: SpatialScoring,
    pub min_similarity: Option<f32>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            default_top_k: 5,
            max_top_k: 100,
            candidate_pool: 100,
            relation: SpatialRelation::Intersects,
            spatial_scoring: SpatialScoring::Binary,
            min_similarity: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub geocode_ms: u64,
    pub embed_ms: u64,
    pub generate_ms: u64,
    pub intent_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self { geocode_ms: 3000, embed_ms: 3000, generate_ms: 3000, intent_ms: 3000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderBackend {
    #[default]
    Nominatim,
    Gazetteer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub name: String,
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 { 1.0 }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderSettings {
    pub backend: GeocoderBackend,
    pub base_url: String,
    pub user_agent: String,
    pub cache_capacity: u64,
    pub gazetteer: Vec<GazetteerEntry>,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            backend: GeocoderBackend::Nominatim,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "geoseek/0.1".to_string(),
            cache_capacity: 1024,
            gazetteer: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Local,
    Fake,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_dir: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            model_dir: None,
            base_url: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
            dim: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub intent_model: String,
    pub intent_temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.3,
            intent_model: "gpt-4o-mini".to_string(),
            intent_temperature: 0.5,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
