//! Persistence of discovered services.
//!
//! The services discovered on a host are stored as a JSON array of
//! `{"check_plugin_name", "item", "parameters"}` objects and read back as the
//! host's check table.

use std::fs;
use std::path::Path;

use checkengine_types::{CheckPluginName, Parameters, Service};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AutochecksError;

/// One discovered service of a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocheckEntry {
    pub check_plugin_name: CheckPluginName,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AutocheckEntry {
    pub fn new(check_plugin_name: CheckPluginName, service: Service) -> Self {
        Self {
            check_plugin_name,
            item: service.item,
            parameters: service.parameters,
        }
    }

    pub fn service(&self) -> Service {
        Service {
            item: self.item.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Read the autochecks at `path`. A missing file means no services.
pub fn load_autochecks(path: &Path) -> Result<Vec<AutocheckEntry>, AutochecksError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No autochecks file");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(AutochecksError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| AutochecksError::Format {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the autochecks to `path`, creating parent directories as needed.
pub fn save_autochecks(path: &Path, entries: &[AutocheckEntry]) -> Result<(), AutochecksError> {
    let io_error = |source| AutochecksError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let content = serde_json::to_string_pretty(entries).map_err(|source| AutochecksError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(io_error)?;
    debug!(path = %path.display(), services = entries.len(), "Saved autochecks");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn entries() -> Vec<AutocheckEntry> {
        vec![
            AutocheckEntry::new(CheckPluginName::new("mem_used").unwrap(), Service::new()),
            AutocheckEntry::new(
                CheckPluginName::new("interfaces").unwrap(),
                Service::with_item("eth0")
                    .parameters(Parameters::new().with("speed", 1_000_000_000u64)),
            ),
        ]
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hosts").join("web01.json");

        save_autochecks(&path, &entries()).unwrap();
        let loaded = load_autochecks(&path).unwrap();

        assert_eq!(loaded, entries());
        assert_eq!(loaded[1].service().item.as_deref(), Some("eth0"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = load_autochecks(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("web01.json");
        fs::write(
            &path,
            json!([
                {"check_plugin_name": "mem_used"},
                {"check_plugin_name": "interfaces", "item": "eth0", "parameters": {"speed": 10}}
            ])
            .to_string(),
        )
        .unwrap();

        let loaded = load_autochecks(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].item, None);
        assert!(loaded[0].parameters.is_empty());
        assert_eq!(loaded[1].parameters.get("speed"), Some(&json!(10)));
    }

    #[test]
    fn test_invalid_plugin_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("web01.json");
        fs::write(&path, r#"[{"check_plugin_name": "not valid"}]"#).unwrap();
        assert!(matches!(
            load_autochecks(&path),
            Err(AutochecksError::Format { .. })
        ));
    }
}
