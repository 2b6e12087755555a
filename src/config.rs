//! Ledger configuration

use serde::{Deserialize, Serialize};

use crate::traits::EntryNumberFormat;
use crate::types::*;

/// Prefix for environment overrides, e.g. `RETAIL_LEDGER__DATABASE_PATH`
pub const CONFIG_ENV_PREFIX: &str = "RETAIL_LEDGER";

/// Runtime settings for a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub entry_number_prefix: String,
    /// Minimum digits of the entry sequence, zero padded
    pub entry_number_width: usize,
    /// When false, statements aggregate the whole ledger history
    pub date_bounded_statements: bool,
    pub database_path: String,
    /// Attempts at committing an entry when its number is taken concurrently
    pub max_posting_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            entry_number_prefix: "JE-".to_string(),
            entry_number_width: 4,
            date_bounded_statements: true,
            database_path: "retail-ledger.db".to_string(),
            max_posting_attempts: 3,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from an optional TOML file, then environment variables.
    ///
    /// Environment variables use the `RETAIL_LEDGER` prefix and `__` as separator and
    /// override values from the file.
    pub fn load(path: Option<&str>) -> LedgerResult<Self> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder();
        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Toml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|err| LedgerError::Configuration(err.to_string()))?;

        let config: LedgerConfig = config
            .try_deserialize()
            .map_err(|err| LedgerError::Configuration(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> LedgerResult<()> {
        if self.entry_number_width == 0 {
            return Err(LedgerError::Configuration(
                "entry_number_width must be at least 1".to_string(),
            ));
        }
        if self.max_posting_attempts == 0 {
            return Err(LedgerError::Configuration(
                "max_posting_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn numbering(&self) -> EntryNumberFormat {
        EntryNumberFormat {
            prefix: self.entry_number_prefix.clone(),
            width: self.entry_number_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.numbering().format(7), "JE-0007");
        assert!(config.date_bounded_statements);
        assert_eq!(config.max_posting_attempts, 3);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "entry_number_prefix = \"GJ/\"\nentry_number_width = 6\ndate_bounded_statements = false"
        )
        .unwrap();

        let config = LedgerConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.numbering().format(12), "GJ/000012");
        assert!(!config.date_bounded_statements);
        assert_eq!(config.database_path, "retail-ledger.db");
    }

    #[test]
    fn rejects_zero_width() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "entry_number_width = 0").unwrap();

        assert!(matches!(
            LedgerConfig::load(file.path().to_str()),
            Err(LedgerError::Configuration(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            LedgerConfig::load(Some("/nonexistent/retail-ledger.toml")),
            Err(LedgerError::Configuration(_))
        ));
    }
}
