//! Engine configuration loader.

use std::path::Path;

use attribute_core::EngineConfig;

use crate::loaders::{LoadResult, read_file};

/// Loader for engine configuration from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file.
    ///
    /// Missing keys fall back to the [`EngineConfig`] defaults.
    pub fn load(path: &Path) -> LoadResult<EngineConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<EngineConfig> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse engine config TOML: {}", e))?;
        if config.event_capacity == 0 {
            anyhow::bail!("event_capacity must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_uses_defaults() {
        let config = ConfigLoader::parse("event_capacity = 32\n").unwrap();

        assert_eq!(config.event_capacity, 32);
        assert_eq!(
            config.warn_on_missing_attribute,
            EngineConfig::DEFAULT_WARN_ON_MISSING_ATTRIBUTE
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(ConfigLoader::parse("event_capacity = 0\n").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "warn_on_missing_attribute = false").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();

        assert!(!config.warn_on_missing_attribute);
        assert_eq!(config.event_capacity, EngineConfig::DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = ConfigLoader::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
