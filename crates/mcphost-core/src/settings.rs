//! Host settings and validation.
//!
//! Settings are read from `MCP_*` environment variables. Every value has a
//! default, so an empty environment yields a usable configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default `tools/call` timeout (5 minutes).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Default per-step handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 30_000;

/// Default number of concurrently executing tool calls.
pub const DEFAULT_MAX_CONCURRENT_TOOLS: usize = 5;

/// Default delay between SIGTERM and SIGKILL when stopping a server.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

const MAX_TIMEOUT_MS: u64 = 86_400_000;
const MAX_CONCURRENT_TOOLS: usize = 1024;
const MAX_SHUTDOWN_GRACE_MS: u64 = 60_000;

/// What to do when two owners declare the same tool name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// The earlier owner keeps the name; the later tool is hidden and logged.
    #[default]
    Shadow,
    /// The later server fails to start with `ToolCollision`.
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shadow" => Ok(Self::Shadow),
            "reject" => Ok(Self::Reject),
            other => Err(format!("expected 'shadow' or 'reject', got '{other}'")),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shadow => f.write_str("shadow"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Runtime settings of the tool host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    /// Budget for each `tools/call` request.
    pub request_timeout: Duration,

    /// Budget for each handshake step (`initialize`, each `tools/list` page).
    pub handshake_timeout: Duration,

    /// Size of the concurrency gate.
    pub max_concurrent_tools: usize,

    /// Tracing filter directive, if configured.
    pub log_level: Option<String>,

    /// Tool name collision policy.
    pub collision_policy: CollisionPolicy,

    /// Sandbox root for the built-in tools. `None` means the current directory.
    pub builtin_root: Option<PathBuf>,

    /// Delay between SIGTERM and SIGKILL when stopping a server.
    pub shutdown_grace: Duration,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            max_concurrent_tools: DEFAULT_MAX_CONCURRENT_TOOLS,
            log_level: None,
            collision_policy: CollisionPolicy::Shadow,
            builtin_root: None,
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
        }
    }
}

impl HostSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(raw) = get("MCP_TIMEOUT") {
            let ms = parse_in_range("MCP_TIMEOUT", &raw, 1, MAX_TIMEOUT_MS)?;
            settings.request_timeout = Duration::from_millis(ms);
        }

        if let Some(raw) = get("MCP_HANDSHAKE_TIMEOUT") {
            let ms = parse_in_range("MCP_HANDSHAKE_TIMEOUT", &raw, 1, MAX_TIMEOUT_MS)?;
            settings.handshake_timeout = Duration::from_millis(ms);
        }

        if let Some(raw) = get("MCP_MAX_CONCURRENT_TOOLS") {
            let max = parse_in_range(
                "MCP_MAX_CONCURRENT_TOOLS",
                &raw,
                1,
                MAX_CONCURRENT_TOOLS as u64,
            )?;
            settings.max_concurrent_tools =
                usize::try_from(max).map_err(|e| SettingsError::InvalidValue {
                    key: "MCP_MAX_CONCURRENT_TOOLS",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
        }

        settings.log_level = get("MCP_LOG_LEVEL");

        if let Some(raw) = get("MCP_TOOL_COLLISION") {
            settings.collision_policy = raw.parse().map_err(|reason| SettingsError::InvalidValue {
                key: "MCP_TOOL_COLLISION",
                value: raw.clone(),
                reason,
            })?;
        }

        if let Some(raw) = get("MCP_BUILTIN_ROOT") {
            let root = PathBuf::from(&raw);
            if !root.is_dir() {
                return Err(SettingsError::InvalidValue {
                    key: "MCP_BUILTIN_ROOT",
                    value: raw,
                    reason: "directory does not exist".to_string(),
                });
            }
            settings.builtin_root = Some(root);
        }

        if let Some(raw) = get("MCP_SHUTDOWN_GRACE") {
            let ms = parse_in_range("MCP_SHUTDOWN_GRACE", &raw, 0, MAX_SHUTDOWN_GRACE_MS)?;
            settings.shutdown_grace = Duration::from_millis(ms);
        }

        Ok(settings)
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_concurrent_tools(mut self, max: usize) -> Self {
        self.max_concurrent_tools = max;
        self
    }

    #[must_use]
    pub const fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    #[must_use]
    pub fn with_builtin_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.builtin_root = Some(root.into());
        self
    }

    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Check the invariants `from_lookup` enforces, for hand-built settings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.request_timeout.is_zero() {
            return Err(SettingsError::OutOfRange {
                key: "MCP_TIMEOUT",
                value: 0,
                min: 1,
                max: MAX_TIMEOUT_MS,
            });
        }
        if self.handshake_timeout.is_zero() {
            return Err(SettingsError::OutOfRange {
                key: "MCP_HANDSHAKE_TIMEOUT",
                value: 0,
                min: 1,
                max: MAX_TIMEOUT_MS,
            });
        }
        if self.max_concurrent_tools == 0 || self.max_concurrent_tools > MAX_CONCURRENT_TOOLS {
            return Err(SettingsError::OutOfRange {
                key: "MCP_MAX_CONCURRENT_TOOLS",
                value: self.max_concurrent_tools as u64,
                min: 1,
                max: MAX_CONCURRENT_TOOLS as u64,
            });
        }
        Ok(())
    }
}

fn parse_in_range(key: &'static str, raw: &str, min: u64, max: u64) -> Result<u64, SettingsError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| SettingsError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        })?;

    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            key,
            value,
            min,
            max,
        });
    }

    Ok(value)
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{key}: invalid value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let settings = HostSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, HostSettings::default());
        assert_eq!(settings.request_timeout, Duration::from_secs(300));
        assert_eq!(settings.max_concurrent_tools, 5);
        assert_eq!(settings.collision_policy, CollisionPolicy::Shadow);
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let settings = HostSettings::from_lookup(lookup(&[
            ("MCP_TIMEOUT", "1500"),
            ("MCP_MAX_CONCURRENT_TOOLS", "2"),
            ("MCP_TOOL_COLLISION", "Reject"),
            ("MCP_LOG_LEVEL", "debug"),
            ("MCP_BUILTIN_ROOT", &root),
            ("MCP_SHUTDOWN_GRACE", "0"),
        ]))
        .unwrap();

        assert_eq!(settings.request_timeout, Duration::from_millis(1500));
        assert_eq!(settings.max_concurrent_tools, 2);
        assert_eq!(settings.collision_policy, CollisionPolicy::Reject);
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.builtin_root.as_deref(), Some(dir.path()));
        assert!(settings.shutdown_grace.is_zero());
    }

    #[test]
    fn test_empty_value_is_unset() {
        let settings = HostSettings::from_lookup(lookup(&[("MCP_TIMEOUT", "  ")])).unwrap();
        assert_eq!(settings.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_rejects_zero_gate() {
        let err = HostSettings::from_lookup(lookup(&[("MCP_MAX_CONCURRENT_TOOLS", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::OutOfRange {
                key: "MCP_MAX_CONCURRENT_TOOLS",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = HostSettings::from_lookup(lookup(&[("MCP_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.to_string().starts_with("MCP_TIMEOUT"));

        let err =
            HostSettings::from_lookup(lookup(&[("MCP_TOOL_COLLISION", "merge")])).unwrap_err();
        assert!(err.to_string().contains("shadow"));
    }

    #[test]
    fn test_rejects_missing_builtin_root() {
        let err = HostSettings::from_lookup(lookup(&[(
            "MCP_BUILTIN_ROOT",
            "/definitely/not/a/real/dir",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("MCP_BUILTIN_ROOT"));
    }

    #[test]
    fn test_validate_hand_built() {
        assert!(HostSettings::default().validate().is_ok());
        assert!(
            HostSettings::default()
                .with_max_concurrent_tools(0)
                .validate()
                .is_err()
        );
    }
}
