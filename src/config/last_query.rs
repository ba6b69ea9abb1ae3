use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastQueryEntry {
    pub sql: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LastQueryFile {
    #[serde(default)]
    queries: BTreeMap<String, LastQueryEntry>,
}

/// Most recently submitted query for each data file, kept across runs.
///
/// Files are keyed by canonical path, so the same file opened through a
/// different relative path finds its query again.
#[derive(Debug)]
pub struct LastQueryStore {
    path: PathBuf,
    queries: BTreeMap<String, LastQueryEntry>,
}

impl LastQueryStore {
    /// Store at the default location next to the config file
    pub fn open_default() -> Result<Self> {
        Self::open(&Self::default_path()?)
    }

    /// Store backed by `path`; a missing file is an empty store
    pub fn open(path: &Path) -> Result<Self> {
        let queries = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read last queries: {:?}", path))?;
            let file: LastQueryFile = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse last queries: {:?}", path))?;
            file.queries
        } else {
            BTreeMap::new()
        };

        debug!(target: "config", "Loaded {} last queries from {:?}", queries.len(), path);
        Ok(Self {
            path: path.to_path_buf(),
            queries,
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("sql-pager").join("last_queries.toml"))
    }

    pub fn get(&self, data_file: &Path) -> Option<&LastQueryEntry> {
        self.queries.get(&file_key(data_file))
    }

    /// Remember `sql` for `data_file` and write the store out
    pub fn record(&mut self, data_file: &Path, sql: &str) -> Result<()> {
        let key = file_key(data_file);
        if self.queries.get(&key).is_some_and(|entry| entry.sql == sql) {
            return Ok(());
        }
        self.queries.insert(
            key,
            LastQueryEntry {
                sql: sql.to_string(),
                submitted_at: Utc::now(),
            },
        );
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let file = LastQueryFile {
            queries: self.queries.clone(),
        };
        let contents = toml::to_string_pretty(&file)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write last queries: {:?}", self.path))?;

        Ok(())
    }
}

fn file_key(data_file: &Path) -> String {
    fs::canonicalize(data_file)
        .unwrap_or_else(|_| data_file.to_path_buf())
        .display()
        .to_string()
}
