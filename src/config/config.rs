use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const TABLE_NAME_PLACEHOLDER: &str = "tableName";

/// `${name}` placeholders in query templates
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^{]+?\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub query: QueryConfig,
    pub display: DisplayConfig,
    pub behavior: BehaviorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Rows fetched per page
    pub page_size: usize,

    /// Query run when a file is opened; `${tableName}` is substituted
    pub default_query: String,

    /// Table name used when not deriving it from the file name
    pub table_name: String,

    /// Name the table after the file's base name instead
    pub use_file_name_as_table_name: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show row numbers in the results grid
    pub show_row_numbers: bool,

    /// chrono format strings for date-like columns
    pub date_format: String,
    pub datetime_format: String,
    pub time_format: String,

    /// Text shown for NULL cells
    pub null_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Run the default query as soon as a file is loaded
    pub auto_execute_on_load: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, used when RUST_LOG is unset
    pub filter: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            default_query: "SELECT * FROM ${tableName}".to_string(),
            table_name: "data".to_string(),
            use_file_name_as_table_name: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_row_numbers: false,
            date_format: "%Y-%m-%d".to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            time_format: "%H:%M:%S".to_string(),
            null_text: "NULL".to_string(),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            auto_execute_on_load: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl QueryConfig {
    /// Table name for a file, according to the naming policy
    pub fn table_name_for(&self, path: &Path) -> String {
        if !self.use_file_name_as_table_name {
            return self.table_name.clone();
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.table_name);
        sanitize_table_name(stem)
    }

    /// Default query with placeholders filled in
    pub fn render_default_query(&self, table_name: &str) -> String {
        render_template(&self.default_query, table_name)
    }
}

/// Replace characters that are awkward in SQL identifiers with underscores.
/// "Business Crime Borough Level" becomes "Business_Crime_Borough_Level".
pub fn sanitize_table_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Substitute `${tableName}`; any other `${...}` placeholder becomes empty.
/// Whitespace inside the braces is ignored.
pub fn render_template(template: &str, table_name: &str) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let name = caps[0][2..caps[0].len() - 1].trim();
            if name == TABLE_NAME_PLACEHOLDER {
                table_name.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

impl Config {
    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.page_size == 0 {
            bail!("query.page_size must be at least 1");
        }
        Ok(())
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("sql-pager").join("config.toml"))
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# sql-pager configuration file
# Location: ~/.config/sql-pager/config.toml (Linux)
#           ~/Library/Application Support/sql-pager/config.toml (macOS)
#           %APPDATA%\sql-pager\config.toml (Windows)

[query]
# Number of rows fetched per page while scrolling
page_size = 100

# Query run when a file is opened. ${tableName} is replaced with the table name
default_query = "SELECT * FROM ${tableName}"

# Name the loaded file is queryable as
table_name = "data"

# Use the file's base name (sanitized) as the table name instead
use_file_name_as_table_name = false

[display]
# Show row numbers in the results grid
show_row_numbers = false

# chrono format strings for date, timestamp and time columns
date_format = "%Y-%m-%d"
datetime_format = "%Y-%m-%d %H:%M:%S"
time_format = "%H:%M:%S"

# Text shown for NULL values
null_text = "NULL"

[behavior]
# Run the default query as soon as a file is loaded
auto_execute_on_load = true

[logging]
# tracing filter, e.g. "debug" or "info,stale=debug". RUST_LOG overrides this
filter = "info"
"#
        .to_string()
    }

    /// Initialize config with a setup wizard
    pub fn init_wizard() -> Result<Self> {
        println!("sql-pager configuration setup");
        println!("=============================");

        let mut config = Config::default();

        let answer = prompt(&format!(
            "Rows per page [{}]: ",
            config.query.page_size
        ))?;
        if !answer.is_empty() {
            config.query.page_size = answer
                .parse()
                .with_context(|| format!("Not a page size: {}", answer))?;
        }

        let answer = prompt("Name tables after the file instead of 'data'? (y/n) [n]: ")?;
        config.query.use_file_name_as_table_name = answer.eq_ignore_ascii_case("y");

        let answer = prompt("Run the default query when a file opens? (y/n) [y]: ")?;
        config.behavior.auto_execute_on_load = !answer.eq_ignore_ascii_case("n");

        config.validate()?;
        config.save()?;

        println!("\nConfiguration saved to: {:?}", Config::get_config_path()?);
        println!("You can edit this file directly to customize further.");

        Ok(config)
    }
}

fn prompt(question: &str) -> Result<String> {
    print!("{}", question);
    std::io::Write::flush(&mut std::io::stdout())?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
