use crate::config::QueryConfig;
use crate::data::datatable::DataTable;
use crate::data::loaders;
use crate::engine::MemoryEngine;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Service responsible for turning a file on disk into a queryable engine
pub struct DataLoaderService {
    query_config: QueryConfig,
}

impl DataLoaderService {
    pub fn new(query_config: QueryConfig) -> Self {
        Self { query_config }
    }

    /// Load a file into a fresh engine
    /// The caller doesn't need to know about file types or naming policy
    pub fn load_file(&self, file_path: &Path) -> Result<LoadedDocument> {
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("File has no extension: {:?}", file_path))?;

        let table_name = self.query_config.table_name_for(file_path);
        let start = Instant::now();

        let datatable = match extension.to_lowercase().as_str() {
            "csv" => {
                info!(target: "query", "Loading CSV file: {:?}", file_path);
                loaders::load_csv_to_datatable(file_path, &table_name)?
            }
            "json" => {
                info!(target: "query", "Loading JSON file: {:?}", file_path);
                loaders::load_json_to_datatable(file_path, &table_name)?
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported file type: {}. Use .csv or .json files.",
                    extension
                ))
            }
        };

        Ok(self.create_document(datatable, file_path, table_name, start.elapsed()))
    }

    fn create_document(
        &self,
        datatable: DataTable,
        source_path: &Path,
        table_name: String,
        load_time: Duration,
    ) -> LoadedDocument {
        let row_count = datatable.row_count();
        let column_count = datatable.column_count();

        let mut engine = MemoryEngine::new();
        engine.register_table(&table_name, datatable);

        LoadedDocument {
            engine,
            source_path: source_path.to_path_buf(),
            default_query: self.query_config.render_default_query(&table_name),
            table_name,
            row_count,
            column_count,
            load_time,
        }
    }
}

/// Load a file with the given naming policy
pub fn load_file(path: &Path, query_config: &QueryConfig) -> Result<LoadedDocument> {
    DataLoaderService::new(query_config.clone())
        .load_file(path)
        .with_context(|| format!("Failed to load {:?}", path))
}

/// An opened file, ready to be queried
#[derive(Debug)]
pub struct LoadedDocument {
    /// Engine with the file registered under `table_name`
    pub engine: MemoryEngine,

    pub source_path: PathBuf,

    /// Name the file is queryable as
    pub table_name: String,

    /// Default query with the table name substituted
    pub default_query: String,

    pub row_count: usize,
    pub column_count: usize,

    /// Time taken to load the file
    pub load_time: Duration,
}

impl LoadedDocument {
    /// Generate a status message for the load operation
    pub fn status_message(&self) -> String {
        format!(
            "Loaded {} as '{}' ({} rows, {} columns) in {} ms",
            self.source_path.display(),
            self.table_name,
            self.row_count,
            self.column_count,
            self.load_time.as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_load_csv_with_file_name_policy() -> Result<()> {
        let mut file = Builder::new().prefix("daily trades ").suffix(".csv").tempfile()?;
        writeln!(file, "id,px\n1,10.5\n2,11")?;

        let config = QueryConfig {
            use_file_name_as_table_name: true,
            ..QueryConfig::default()
        };
        let document = load_file(file.path(), &config)?;

        assert!(document.table_name.starts_with("daily_trades_"));
        assert_eq!(
            document.default_query,
            format!("SELECT * FROM {}", document.table_name)
        );
        assert_eq!(document.row_count, 2);
        let result = document.engine.query(&document.default_query).unwrap();
        assert_eq!(result.row_count(), 2);
        assert!(document.status_message().contains("2 rows, 2 columns"));
        Ok(())
    }

    #[test]
    fn test_fixed_table_name() -> Result<()> {
        let mut file = Builder::new().suffix(".json").tempfile()?;
        writeln!(file, r#"[{{"a": 1}}]"#)?;

        let document = load_file(file.path(), &QueryConfig::default())?;
        assert_eq!(document.table_name, "data");
        assert_eq!(document.default_query, "SELECT * FROM data");
        Ok(())
    }

    #[test]
    fn test_unsupported_extension() -> Result<()> {
        let file = Builder::new().suffix(".parquet").tempfile()?;
        let err = load_file(file.path(), &QueryConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("Unsupported file type"));
        Ok(())
    }
}
