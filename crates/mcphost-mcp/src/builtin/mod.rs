//! Tools implemented in-process.
//!
//! Built-ins are always registered, take precedence over server tools of
//! the same name, and never touch a child process. Every path argument is
//! confined to the [`Sandbox`] root.

mod fs;
mod sandbox;

use std::io;
use std::path::Path;

use mcphost_core::{BUILTIN_SERVER_ID, HostError, Tool, ToolResult};
use serde_json::{Value, json};

pub use fs::MAX_READ_BYTES;
pub use sandbox::Sandbox;

type Handler = fn(&Sandbox, &Value) -> Result<ToolResult, HostError>;

struct BuiltinSpec {
    name: &'static str,
    description: &'static str,
    handler: Handler,
    schema: fn() -> Value,
}

const SPECS: &[BuiltinSpec] = &[
    BuiltinSpec {
        name: "list_dir",
        description: "List the entries of a directory, sorted by name, with kind and size.",
        handler: fs::list_dir,
        schema: || path_schema(false),
    },
    BuiltinSpec {
        name: "read_file",
        description: "Read a UTF-8 text file (up to 1 MiB).",
        handler: fs::read_file,
        schema: || path_schema(true),
    },
    BuiltinSpec {
        name: "write_file",
        description: "Write text to a file, replacing its content.",
        handler: fs::write_file,
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to the root" },
                    "content": { "type": "string" },
                    "createDirs": { "type": "boolean", "description": "Create missing parent directories" }
                },
                "required": ["path", "content"]
            })
        },
    },
    BuiltinSpec {
        name: "path_info",
        description: "Report whether a path exists, its kind, size and modification time.",
        handler: fs::path_info,
        schema: || path_schema(true),
    },
];

fn path_schema(required: bool) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": "Path relative to the root" }
        }
    });
    if required {
        schema["required"] = json!(["path"]);
    }
    schema
}

/// The built-in tool set bound to one sandbox root.
#[derive(Debug, Clone)]
pub struct BuiltinTools {
    sandbox: Sandbox,
}

impl BuiltinTools {
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            sandbox: Sandbox::new(root)?,
        })
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    /// Tool descriptors, owned by [`BUILTIN_SERVER_ID`].
    pub fn descriptors(&self) -> Vec<Tool> {
        SPECS
            .iter()
            .map(|spec| {
                Tool::new(spec.name, BUILTIN_SERVER_ID)
                    .with_description(spec.description)
                    .with_input_schema((spec.schema)())
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        SPECS.iter().any(|spec| spec.name == name)
    }

    /// Run a built-in synchronously.
    pub fn call(&self, name: &str, arguments: &Value) -> Result<ToolResult, HostError> {
        let spec = SPECS
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| HostError::ToolNotFound {
                name: name.to_string(),
            })?;
        tracing::debug!(tool = name, "Running built-in tool");
        (spec.handler)(&self.sandbox, arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> (tempfile::TempDir, BuiltinTools) {
        let dir = tempfile::tempdir().unwrap();
        let tools = BuiltinTools::new(dir.path()).unwrap();
        (dir, tools)
    }

    fn payload(result: &ToolResult) -> Value {
        serde_json::from_str(&result.text()).unwrap()
    }

    #[test]
    fn test_descriptors() {
        let (_dir, tools) = tools();
        let names: Vec<String> = tools.descriptors().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["list_dir", "read_file", "write_file", "path_info"]);
        assert!(tools.descriptors().iter().all(Tool::is_builtin));
        assert!(tools.contains("path_info"));
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, tools) = tools();
        let written = tools
            .call("write_file", &json!({"path": "a.txt", "content": "hello"}))
            .unwrap();
        assert!(written.success);
        assert_eq!(payload(&written)["bytesWritten"], 5);

        let read = tools.call("read_file", &json!({"path": "a.txt"})).unwrap();
        assert_eq!(payload(&read)["content"], "hello");
    }

    #[test]
    fn test_write_requires_create_dirs_for_missing_parent() {
        let (dir, tools) = tools();
        let err = tools
            .call("write_file", &json!({"path": "x/y/z.txt", "content": "1"}))
            .unwrap_err();
        assert!(matches!(err, HostError::Builtin { .. }));

        tools
            .call(
                "write_file",
                &json!({"path": "x/y/z.txt", "content": "1", "createDirs": true}),
            )
            .unwrap();
        assert!(dir.path().join("x/y/z.txt").is_file());
    }

    #[test]
    fn test_list_dir_is_sorted() {
        let (dir, tools) = tools();
        std::fs::write(dir.path().join("b.txt"), "bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("c")).unwrap();

        let result = tools.call("list_dir", &json!({})).unwrap();
        let entries = payload(&result)["entries"].as_array().unwrap().clone();
        let names: Vec<&str> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c"]);
        assert_eq!(entries[1]["size"], 2);
        assert_eq!(entries[2]["kind"], "dir");
    }

    #[test]
    fn test_read_file_size_cap() {
        let (dir, tools) = tools();
        let big = vec![b'x'; usize::try_from(MAX_READ_BYTES).unwrap() + 1];
        std::fs::write(dir.path().join("big.bin"), big).unwrap();
        let err = tools
            .call("read_file", &json!({"path": "big.bin"}))
            .unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_path_info() {
        let (dir, tools) = tools();
        std::fs::write(dir.path().join("f"), "abc").unwrap();

        let info = payload(&tools.call("path_info", &json!({"path": "f"})).unwrap());
        assert_eq!(info["exists"], true);
        assert_eq!(info["kind"], "file");
        assert_eq!(info["size"], 3);

        let missing = payload(&tools.call("path_info", &json!({"path": "nope"})).unwrap());
        assert_eq!(missing["exists"], false);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_through_dangling_symlink_is_refused() {
        let (dir, tools) = tools();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();

        let err = tools
            .call("write_file", &json!({"path": "link", "content": "escaped"}))
            .unwrap_err();
        assert!(matches!(err, HostError::Sandbox { .. }), "{err}");
        assert!(!target.exists());
    }

    #[test]
    fn test_escape_and_bad_arguments() {
        let (_dir, tools) = tools();
        assert!(matches!(
            tools.call("read_file", &json!({"path": "../../etc/passwd"})),
            Err(HostError::Sandbox { .. })
        ));
        assert!(matches!(
            tools.call("read_file", &json!({"path": 42})),
            Err(HostError::InvalidArguments { .. })
        ));
        assert!(matches!(
            tools.call("delete_everything", &json!({})),
            Err(HostError::ToolNotFound { .. })
        ));
    }
}
