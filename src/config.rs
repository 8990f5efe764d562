use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::columns::{column_keys, ColumnKey};
use crate::error::ConfigError;
use crate::filter::RuleSpec;

/// Name of the configuration file looked up in the pool root
pub const CONFIG_FILE: &str = "gene_compare.yaml";

/// Run configuration, as written by lab users in `gene_compare.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "Filters")]
    pub filters: Vec<RuleSpec>,

    #[serde(rename = "Select Columns")]
    pub select_columns: Vec<String>,

    #[serde(rename = "Flagged Genes Path")]
    pub flagged_genes_path: Option<String>,

    #[serde(rename = "Flagged Genes Details")]
    pub flagged_genes_details: bool,
}

impl Config {
    /// Read `gene_compare.yaml` from `pool_root`. A missing or empty file is
    /// the default configuration.
    pub fn load(pool_root: &Path) -> Result<Self, ConfigError> {
        let path = pool_root.join(CONFIG_FILE);
        if !path.is_file() {
            debug!("no {} in {}", CONFIG_FILE, pool_root.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Yaml {
            path: path.clone(),
            source,
        })?;
        info!(
            "loaded {} with {} filter rule(s)",
            path.display(),
            config.filters.len()
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Option<Config> = serde_yaml::from_str(content)?;
        Ok(config.unwrap_or_default())
    }

    /// `Select Columns` resolved to registry keys
    pub fn selected_keys(&self) -> Result<Vec<ColumnKey>, ConfigError> {
        self.select_columns
            .iter()
            .map(|name| {
                ColumnKey::from_key(name).ok_or_else(|| ConfigError::UnknownColumn {
                    column: name.clone(),
                    known: column_keys().join(", "),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RuleMode;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
Filters:
  - name: low quality
    exclude:
      column: qual
      lt: 20
  - name: coding only
    include:
      or:
        - {column: effect, startswith: NON_SYN}
        - {column: effect, eq: STOP_GAINED}
Select Columns: [chromo, pos, hh, gene_id]
Flagged Genes Path: flagged.tsv
Flagged Genes Details: true
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_yaml(CONFIG).unwrap();
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters[0].name, "low quality");
        assert!(matches!(config.filters[0].mode, RuleMode::Exclude(_)));
        assert_eq!(
            config.selected_keys().unwrap(),
            vec![ColumnKey::Chromo, ColumnKey::Pos, ColumnKey::Hh, ColumnKey::GeneId]
        );
        assert_eq!(config.flagged_genes_path.as_deref(), Some("flagged.tsv"));
        assert!(config.flagged_genes_details);
    }

    #[test]
    fn test_missing_and_empty_config_are_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.filters.is_empty());
        assert!(config.select_columns.is_empty());

        std::fs::write(dir.path().join(CONFIG_FILE), "\n").unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.flagged_genes_path.is_none());
        assert!(!config.flagged_genes_details);
    }

    #[test]
    fn test_unknown_selected_column() {
        let config = Config::from_yaml("Select Columns: [chromo, Chromosome]").unwrap();
        match config.selected_keys() {
            Err(ConfigError::UnknownColumn { column, known }) => {
                assert_eq!(column, "Chromosome");
                assert!(known.contains("gene_id"));
            }
            other => panic!("expected UnknownColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_yaml_names_the_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "Filters: [unclosed").unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
