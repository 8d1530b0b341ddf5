//! Runtime settings, read from `ledgerdrop.toml`.
//!
//! Every field has a default, so an absent or partial file is valid. CLI flags
//! are applied on top by `main`.

use anyhow::{Context, Result};
use clap::ValueEnum;
use ledgerdrop_import::{
    default_rules, CategoryRule, CategoryRuleEngine, IngestPipeline, DEFAULT_DATE_FORMAT,
};
use ledgerdrop_watch::SettleStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "ledgerdrop.toml";
const DEFAULT_WATCH_DIR: &str = "./finance/watch";

/// Where cleaned batches are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Sqlite,
    Csv,
}

/// Platform directories for the database and the default config file.
#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("com", "ledgerdrop", "Ledgerdrop")
            .context("could not determine a home directory")?;
        Ok(Self {
            data_dir: dirs.data_dir().to_path_buf(),
            config_dir: dirs.config_dir().to_path_buf(),
        })
    }

    pub fn with_base_dir(base: &Path) -> Self {
        Self {
            data_dir: base.join("data"),
            config_dir: base.to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn default_database(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder scanned for new statement files.
    pub watch_dir: PathBuf,
    /// Defaults to `processed` beside the watch folder.
    pub processed_dir: Option<PathBuf>,
    /// Defaults to `failed` beside the watch folder.
    pub failed_dir: Option<PathBuf>,
    pub sink: SinkKind,
    /// SQLite file. Defaults to the platform data dir.
    pub database: Option<PathBuf>,
    /// Target folder for the CSV sink.
    pub output_dir: PathBuf,
    pub date_format: String,
    pub extension: String,
    pub settle: SettleStrategy,
    /// Ordered category rules; the built-in set when absent.
    pub rules: Option<Vec<CategoryRule>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from(DEFAULT_WATCH_DIR),
            processed_dir: None,
            failed_dir: None,
            sink: SinkKind::default(),
            database: None,
            output_dir: PathBuf::from("./finance/cleaned"),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            extension: "csv".to_string(),
            settle: SettleStrategy::default(),
            rules: None,
        }
    }
}

impl Settings {
    /// Read settings from `path`, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.processed_dir
            .clone()
            .unwrap_or_else(|| sibling(&self.watch_dir, "processed"))
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.failed_dir
            .clone()
            .unwrap_or_else(|| sibling(&self.watch_dir, "failed"))
    }

    pub fn database(&self, paths: &AppPaths) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| paths.default_database())
    }

    /// Compile the configured rules. A bad pattern fails here, at startup.
    pub fn rule_engine(&self) -> Result<CategoryRuleEngine> {
        let rules = self.rules.clone().unwrap_or_else(default_rules);
        CategoryRuleEngine::new(rules).context("invalid category rules")
    }

    pub fn pipeline(&self) -> Result<IngestPipeline> {
        Ok(IngestPipeline::new(self.rule_engine()?, &self.date_format))
    }
}

fn sibling(dir: &Path, name: &str) -> PathBuf {
    match dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => dir.join("..").join(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.watch_dir, PathBuf::from("./finance/watch"));
        assert_eq!(s.processed_dir(), PathBuf::from("./finance/processed"));
        assert_eq!(s.failed_dir(), PathBuf::from("./finance/failed"));
        assert_eq!(s.sink, SinkKind::Sqlite);
        assert_eq!(s.date_format, "%m/%d/%Y");
        assert_eq!(s.settle, SettleStrategy::default());
        assert_eq!(s.rule_engine().unwrap().len(), 7);
    }

    #[test]
    fn sibling_of_bare_dir() {
        assert_eq!(sibling(Path::new("watch"), "failed"), PathBuf::from("watch/../failed"));
        assert_eq!(sibling(Path::new("/srv/in"), "failed"), PathBuf::from("/srv/failed"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let s = Settings::from_toml("watch_dir = \"/srv/bank/in\"\nsink = \"csv\"\n").unwrap();
        assert_eq!(s.sink, SinkKind::Csv);
        assert_eq!(s.processed_dir(), PathBuf::from("/srv/bank/processed"));
        assert_eq!(s.extension, "csv");
    }

    #[test]
    fn full_file() {
        let s = Settings::from_toml(
            r#"
watch_dir = "/in"
processed_dir = "/done"
failed_dir = "/bad"
database = "/var/lib/ledger.db"
date_format = "%Y-%m-%d"

[settle]
strategy = "stable_size"
interval = 100
max_polls = 30

[[rules]]
label = "Coffee"
pattern = "COFFEE|ESPRESSO"

[[rules]]
label = "Rent"
pattern = "rent"
match_type = "contains"
"#,
        )
        .unwrap();

        assert_eq!(s.processed_dir(), PathBuf::from("/done"));
        assert_eq!(s.failed_dir(), PathBuf::from("/bad"));
        let paths = AppPaths::with_base_dir(Path::new("/home/u/.ledgerdrop"));
        assert_eq!(s.database(&paths), PathBuf::from("/var/lib/ledger.db"));
        assert_eq!(
            s.settle,
            SettleStrategy::StableSize {
                interval: Duration::from_millis(100),
                max_polls: 30
            }
        );

        let pipeline = s.pipeline().unwrap();
        assert_eq!(pipeline.date_format(), "%Y-%m-%d");
        let engine = pipeline.rules();
        assert_eq!(engine.labels(), vec!["Coffee", "Rent", "Other"]);
        assert_eq!(engine.categorize(Some("morning espresso")), "Coffee");
        assert_eq!(engine.categorize(Some("APARTMENT RENT JAN")), "Rent");
    }

    #[test]
    fn bad_rule_pattern_fails_at_startup() {
        let s = Settings::from_toml("[[rules]]\nlabel = \"Broken\"\npattern = \"(unclosed\"\n").unwrap();
        assert!(s.rule_engine().is_err());
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(s.watch_dir, PathBuf::from("./finance/watch"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "sink = \"postgres\"\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn default_database_under_data_dir() {
        let paths = AppPaths::with_base_dir(Path::new("/base"));
        assert_eq!(Settings::default().database(&paths), PathBuf::from("/base/data/ledger.db"));
        assert_eq!(paths.config_file(), PathBuf::from("/base/ledgerdrop.toml"));
    }
}
