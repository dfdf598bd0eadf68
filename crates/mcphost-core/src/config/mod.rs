//! Servers file loading and saving.
//!
//! The servers file maps server ids to their declared configuration:
//!
//! ```json
//! { "servers": { "fs": { "type": "stdio", "command": "npx", "args": ["-y", "pkg"] } } }
//! ```
//!
//! The mapping may also be keyed `mcpServers`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ServerConfig;

/// Application directory name under the platform config dir.
pub const APP_DIR_NAME: &str = "mcphost";

/// File name of the servers file.
pub const SERVERS_FILE_NAME: &str = "servers.json";

/// Errors from reading or writing the servers file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid servers file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid server '{id}': {reason}")]
    InvalidServer { id: String, reason: String },

    #[error("Could not determine the platform configuration directory")]
    NoConfigDir,
}

/// Default servers file location: `<config_dir>/mcphost/servers.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigFileError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(SERVERS_FILE_NAME))
        .ok_or(ConfigFileError::NoConfigDir)
}

/// In-memory form of the servers file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServersFile {
    /// Server entries keyed by id.
    #[serde(default, alias = "mcpServers")]
    pub servers: BTreeMap<String, ServerEntry>,
}

/// One entry of the servers file. Identical to [`ServerConfig`] minus the id,
/// which is the map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerEntry(Value);

impl ServersFile {
    /// Load and validate a servers file.
    ///
    /// A missing file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Servers file not found, using empty config");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigFileError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file = Self::parse(&text).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        // Surface per-entry problems at load time, not at first start.
        file.configs()?;
        Ok(file)
    }

    /// Parse a servers file from JSON text without validating entries.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Write the file back, pretty-printed, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigFileError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut text = serde_json::to_string_pretty(self).map_err(|source| {
            ConfigFileError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        text.push('\n');

        std::fs::write(path, text).map_err(|source| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), servers = self.servers.len(), "Saved servers file");
        Ok(())
    }

    /// Decode and validate every entry, in id order.
    ///
    /// The id comes from the map key; `name` defaults to the id.
    pub fn configs(&self) -> Result<Vec<ServerConfig>, ConfigFileError> {
        self.servers
            .iter()
            .map(|(id, entry)| entry.to_config(id))
            .collect()
    }

    /// Insert or replace an entry.
    pub fn upsert(&mut self, config: &ServerConfig) -> Result<(), ConfigFileError> {
        let entry = ServerEntry::from_config(config)?;
        self.servers.insert(config.id.clone(), entry);
        Ok(())
    }

    /// Remove an entry, returning whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.servers.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.servers.contains_key(id)
    }
}

impl ServerEntry {
    fn to_config(&self, id: &str) -> Result<ServerConfig, ConfigFileError> {
        let invalid = |reason: String| ConfigFileError::InvalidServer {
            id: id.to_string(),
            reason,
        };

        let Value::Object(mut fields) = self.0.clone() else {
            return Err(invalid("entry must be a JSON object".to_string()));
        };
        fields.insert("id".to_string(), Value::String(id.to_string()));

        let mut config: ServerConfig =
            serde_json::from_value(Value::Object(fields)).map_err(|e| invalid(e.to_string()))?;

        if config.name.trim().is_empty() {
            config.name = id.to_string();
        }

        config.validate().map_err(invalid)?;
        Ok(config)
    }

    fn from_config(config: &ServerConfig) -> Result<Self, ConfigFileError> {
        let mut value = serde_json::to_value(config).map_err(|e| ConfigFileError::InvalidServer {
            id: config.id.clone(),
            reason: e.to_string(),
        })?;
        if let Value::Object(ref mut fields) = value {
            fields.remove("id");
            if fields.get("name").and_then(Value::as_str) == Some(config.id.as_str()) {
                fields.remove("name");
            }
        }
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportKind;

    const SAMPLE: &str = r#"{
        "mcpServers": {
            "fs": {
                "command": "npx",
                "args": ["-y", "@modelcontextprotocol/server-filesystem"],
                "env": {"DEBUG": "1"},
                "category": "files"
            },
            "remote": { "type": "http", "url": "http://localhost:3001", "enabled": false, "name": "Remote" }
        }
    }"#;

    #[test]
    fn test_parse_defaults_and_alias() {
        let file = ServersFile::parse(SAMPLE).unwrap();
        let configs = file.configs().unwrap();
        assert_eq!(configs.len(), 2);

        let fs = &configs[0];
        assert_eq!(fs.id, "fs");
        assert_eq!(fs.name, "fs");
        assert_eq!(fs.transport, TransportKind::Stdio);
        assert!(fs.enabled);
        assert_eq!(fs.args.len(), 2);

        let remote = &configs[1];
        assert_eq!(remote.transport, TransportKind::Http);
        assert_eq!(remote.display_name(), "Remote");
        assert!(!remote.enabled);
    }

    #[test]
    fn test_invalid_entry_is_named() {
        let file = ServersFile::parse(r#"{"servers": {"bad": {"command": "npx -y pkg"}}}"#).unwrap();
        match file.configs().unwrap_err() {
            ConfigFileError::InvalidServer { id, .. } => assert_eq!(id, "bad"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = ServersFile::load(&dir.path().join("none.json")).unwrap();
        assert!(file.servers.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SERVERS_FILE_NAME);

        let mut file = ServersFile::default();
        file.upsert(&ServerConfig::stdio("echo", "node", vec!["echo.js".into()]).with_env("K", "V"))
            .unwrap();
        file.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"servers\""));
        assert!(!text.contains("\"id\""));

        let mut loaded = ServersFile::load(&path).unwrap();
        let configs = loaded.configs().unwrap();
        assert_eq!(configs[0].id, "echo");
        assert_eq!(configs[0].env.get("K").map(String::as_str), Some("V"));

        assert!(loaded.remove("echo"));
        assert!(!loaded.contains("echo"));
    }

    #[test]
    fn test_malformed_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ServersFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("servers.json"));
    }
}
