//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{DEFAULT_MIN_SNIPPET_LENGTH, DEFAULT_TOP_K};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wrap an already assembled provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config = Self { figment };
        config.validate_for_env("test")?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Like [`Config::get`], but an absent section yields `T::default()`.
    pub fn get_or_default<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.contains(key) {
            self.get(key) } else { Ok(T::default())
        }
    }

    pub fn search_settings(&self) -> Result<SearchSettings> {
        self.get_or_default("search")
    }

    pub fn snippet_options(&self) -> Result<SnippetOptions> {
        self.get_or_default("snippet")
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        self.search_settings()?.validate()?;
        self.snippet_options()?.validate()?;
        match env {
            "prod" | "production" => {
                let search = self.search_settings()?;
                if search.model_id.starts_with("hash") {
                    return Err(Error::InvalidConfig(format!(
                        "production config uses the development embedder '{}'",
                        search.model_id
                    )));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

/// `[search]` section: asset locations and request defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub index_path: String,
    pub index_table: String,
    pub metadata_path: String,
    pub model_id: String,
    pub default_top_k: usize,
    pub min_snippet_length: usize,
    /// Vector neighbors fetched per requested result, to survive filter and dedup attrition.
    pub overfetch_factor: usize,
    pub query_cache_capacity: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            index_path: "indexes/chunks.lance".to_string(),
            index_table: "chunks".to_string(),
            metadata_path: "indexes/metadata.json".to_string(),
            model_id: "hash-384".to_string(),
            default_top_k: DEFAULT_TOP_K,
            min_snippet_length: DEFAULT_MIN_SNIPPET_LENGTH,
            overfetch_factor: 5,
            query_cache_capacity: 1024,
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.overfetch_factor == 0 {
            return Err(Error::InvalidConfig("search.overfetch_factor must be >= 1".to_string()));
        }
        if self.query_cache_capacity == 0 {
            return Err(Error::InvalidConfig("search.query_cache_capacity must be >= 1".to_string()));
        }
        if self.default_top_k == 0 {
            return Err(Error::InvalidConfig("search.default_top_k must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn index_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.index_path)
    }

    pub fn metadata_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.metadata_path)
    }
}

/// Granularity of snippet context windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextUnit {
    /// UAX #29 sentence boundaries; suits reflowed prose.
    #[default]
    Sentence,
    /// `\n`-separated lines; suits text that keeps the source layout.
    Line,
}

/// `[snippet]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetOptions {
    pub unit: ContextUnit,
    /// Units of context on each side of the matched span.
    pub context: usize,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for SnippetOptions {
    fn default() -> Self {
        Self { unit: ContextUnit::Sentence, context: 2, min_chars: 200, max_chars: 500 }
    }
}

impl SnippetOptions {
    pub fn lines() -> Self {
        Self { unit: ContextUnit::Line, context: 5, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(Error::InvalidConfig("snippet.max_chars must be >= 1".to_string()));
        }
        if self.min_chars > self.max_chars {
            return Err(Error::InvalidConfig(format!(
                "snippet.min_chars ({}) exceeds snippet.max_chars ({})",
                self.min_chars, self.max_chars
            )));
        }
        Ok(())
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
    if p.is_absolute() {
        p } else { base.join(p)
    }
}
