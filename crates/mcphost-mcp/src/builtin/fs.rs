//! Filesystem built-ins: `list_dir`, `read_file`, `write_file`, `path_info`.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use mcphost_core::{HostError, ToolResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::sandbox::Sandbox;

/// Largest file `read_file` returns.
pub const MAX_READ_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct PathArgs {
    #[serde(default = "current_dir")]
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteArgs {
    path: String,
    content: String,
    #[serde(default)]
    create_dirs: bool,
}

fn current_dir() -> String {
    ".".to_string()
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, HostError> {
    serde_json::from_value(args.clone()).map_err(|e| HostError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn json_result(value: &Value) -> ToolResult {
    ToolResult::from_text(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
}

fn kind_of(meta: &fs::Metadata) -> &'static str {
    let ft = meta.file_type();
    if ft.is_symlink() {
        "symlink"
    } else if ft.is_dir() {
        "dir"
    } else if ft.is_file() {
        "file"
    } else {
        "other"
    }
}

pub fn list_dir(sandbox: &Sandbox, args: &Value) -> Result<ToolResult, HostError> {
    const TOOL: &str = "list_dir";
    let args: PathArgs = parse_args(TOOL, args)?;
    let dir = sandbox.resolve(&args.path)?;
    let io_err = |e: std::io::Error| HostError::builtin(TOOL, format!("{}: {e}", args.path));

    let mut entries = Vec::new();
    for entry in fs::read_dir(&dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let meta = entry.path().symlink_metadata().map_err(io_err)?;
        entries.push(json!({
            "name": entry.file_name().to_string_lossy(),
            "kind": kind_of(&meta),
            "size": meta.len(),
        }));
    }
    entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    Ok(json_result(&json!({
        "path": sandbox.relative(&dir).display().to_string(),
        "entries": entries,
    })))
}

pub fn read_file(sandbox: &Sandbox, args: &Value) -> Result<ToolResult, HostError> {
    const TOOL: &str = "read_file";
    let args: PathArgs = parse_args(TOOL, args)?;
    let path = sandbox.resolve(&args.path)?;
    let io_err = |e: std::io::Error| HostError::builtin(TOOL, format!("{}: {e}", args.path));

    let meta = fs::metadata(&path).map_err(io_err)?;
    if !meta.is_file() {
        return Err(HostError::builtin(TOOL, format!("{}: not a file", args.path)));
    }
    if meta.len() > MAX_READ_BYTES {
        return Err(HostError::builtin(
            TOOL,
            format!(
                "{}: file is {} bytes, limit is {MAX_READ_BYTES}",
                args.path,
                meta.len()
            ),
        ));
    }

    let content = fs::read_to_string(&path).map_err(io_err)?;
    Ok(json_result(&json!({
        "path": sandbox.relative(&path).display().to_string(),
        "size": meta.len(),
        "content": content,
    })))
}

pub fn write_file(sandbox: &Sandbox, args: &Value) -> Result<ToolResult, HostError> {
    const TOOL: &str = "write_file";
    let args: WriteArgs = parse_args(TOOL, args)?;
    let path = sandbox.resolve(&args.path)?;
    let io_err = |e: std::io::Error| HostError::builtin(TOOL, format!("{}: {e}", args.path));

    if let Some(parent) = path.parent() {
        if !parent.is_dir() {
            if args.create_dirs {
                fs::create_dir_all(parent).map_err(io_err)?;
            } else {
                return Err(HostError::builtin(
                    TOOL,
                    format!("{}: parent directory does not exist (set createDirs)", args.path),
                ));
            }
        }
    }

    // `resolve` returns a link-free path; a link here appeared since.
    if path
        .symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
    {
        return Err(HostError::Sandbox {
            path: args.path.clone(),
        });
    }

    fs::write(&path, args.content.as_bytes()).map_err(io_err)?;
    Ok(json_result(&json!({
        "path": sandbox.relative(&path).display().to_string(),
        "bytesWritten": args.content.len(),
    })))
}

pub fn path_info(sandbox: &Sandbox, args: &Value) -> Result<ToolResult, HostError> {
    const TOOL: &str = "path_info";
    let args: PathArgs = parse_args(TOOL, args)?;
    let path = sandbox.resolve(&args.path)?;
    let display = sandbox.relative(&path).display().to_string();

    let Ok(meta) = Path::new(&path).symlink_metadata() else {
        return Ok(json_result(&json!({ "path": display, "exists": false })));
    };

    let modified = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

    Ok(json_result(&json!({
        "path": display,
        "absolutePath": path.display().to_string(),
        "exists": true,
        "kind": kind_of(&meta),
        "size": meta.len(),
        "readonly": meta.permissions().readonly(),
        "modified": modified,
    })))
}
