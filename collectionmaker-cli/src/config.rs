//! Layered CLI configuration: built-in defaults, then a user TOML file

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use collectionmaker_core::{BenchConfig, ConnectionConfig};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Everything the binary reads from configuration files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// How to reach the document store
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Run shape for the `batchimport` command
    #[serde(default)]
    pub batchimport: BenchConfig,
}

impl CliConfig {
    /// Parse the compiled-in defaults
    pub fn builtin() -> Result<Self> {
        Self::from_layers(builtin_table()?, None)
    }

    fn from_layers(mut base: toml::Table, overlay: Option<toml::Table>) -> Result<Self> {
        if let Some(overlay) = overlay {
            merge_tables(&mut base, overlay);
        }
        toml::Value::Table(base)
            .try_into()
            .context("configuration does not match the expected layout")
    }
}

fn builtin_table() -> Result<toml::Table> {
    toml::from_str(DEFAULT_CONFIG).context("built-in default config is invalid")
}

/// Overlay keys replace base keys; nested tables merge key by key
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, nested);
                } else {
                    base.insert(key, toml::Value::Table(nested));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// A configuration bound to the file it was (or will be) stored in
pub struct ConfigManager {
    path: PathBuf,
    config: CliConfig,
}

impl ConfigManager {
    /// Load from the platform config directory
    pub fn load() -> Result<Self> {
        let path = default_config_path()?;
        Self::load_with_path(path)
    }

    /// Load defaults, then layer the file at `path` on top if it exists
    pub fn load_with_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let overlay = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config at {}", path.display()))?;
            let table: toml::Table = toml::from_str(&contents)
                .with_context(|| format!("invalid config at {}", path.display()))?;
            Some(table)
        } else {
            None
        };

        let config = CliConfig::from_layers(builtin_table()?, overlay)
            .with_context(|| format!("invalid config at {}", path.display()))?;
        Ok(Self { path, config })
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Mutable access, used to apply command-line overrides
    pub const fn config_mut(&mut self) -> &mut CliConfig {
        &mut self.config
    }

    /// Consume the manager
    #[must_use]
    pub fn into_config(self) -> CliConfig {
        self.config
    }

    /// File backing this configuration
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the effective configuration back to its file.
    ///
    /// The password is left out; supply it through the environment or the
    /// command line.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }
        let toml = toml::to_string_pretty(&self.config)?;
        fs::write(&self.path, toml)
            .with_context(|| format!("failed to write config to {}", self.path.display()))?;
        Ok(())
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base =
        dirs::config_dir().ok_or_else(|| anyhow!("unable to determine configuration directory"))?;
    Ok(base.join("collectionmaker").join("config.toml"))
}
