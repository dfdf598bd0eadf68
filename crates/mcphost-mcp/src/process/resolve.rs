//! Executable resolution and child `PATH` construction.
//!
//! A server's `command` is resolved to an absolute path before spawning so
//! that a failure can say exactly where we looked.

use std::collections::HashSet;
use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Outcome of checking one candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Ok,
    NotFound,
    NotAFile,
    NotExecutable,
    PermissionDenied,
    IoError(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NotFound => write!(f, "not found"),
            Self::NotAFile => write!(f, "not a file"),
            Self::NotExecutable => write!(f, "not executable"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::IoError(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

/// One candidate that was checked.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub candidate: PathBuf,
    pub outcome: AttemptOutcome,
}

/// A resolved executable and the candidates checked on the way.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub path: PathBuf,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Command is empty")]
    EmptyCommand,

    #[error("Could not resolve '{command}' to an executable. Tried:\n{attempts}")]
    NotResolved { command: String, attempts: String },
}

impl ResolveError {
    fn not_resolved(command: &str, attempts: &[Attempt]) -> Self {
        let attempts = if attempts.is_empty() {
            "  (no candidates checked)".to_string()
        } else {
            attempts
                .iter()
                .map(|a| format!("  {}: {}", a.candidate.display(), a.outcome))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Self::NotResolved {
            command: command.to_string(),
            attempts,
        }
    }
}

/// Filesystem checks, injectable for tests.
pub trait FsProvider {
    fn check_executable(&self, path: &Path) -> AttemptOutcome;
}

/// Real filesystem.
pub struct SystemFs;

impl FsProvider for SystemFs {
    fn check_executable(&self, path: &Path) -> AttemptOutcome {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AttemptOutcome::NotFound,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return AttemptOutcome::PermissionDenied;
            }
            Err(e) => return AttemptOutcome::IoError(e.to_string()),
        };

        if !metadata.is_file() {
            return AttemptOutcome::NotAFile;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return AttemptOutcome::NotExecutable;
            }
        }

        AttemptOutcome::Ok
    }
}

/// Where to look for a command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchContext<'a> {
    /// Server working directory, for commands containing a path separator.
    pub working_dir: Option<&'a Path>,
    /// Extra search entries in `PATH` syntax, searched before `path_var`.
    pub path_extra: Option<&'a str>,
    /// The host's `PATH`.
    pub path_var: Option<&'a OsStr>,
}

/// Resolve `command` to an executable path.
///
/// Absolute commands are checked in place. Commands containing a separator
/// are resolved against the working directory (or the host's current
/// directory). Bare names are searched in `path_extra`, then `PATH`.
pub fn resolve_executable(
    command: &str,
    ctx: SearchContext<'_>,
    fs: &dyn FsProvider,
) -> Result<Resolved, ResolveError> {
    if command.trim().is_empty() {
        return Err(ResolveError::EmptyCommand);
    }

    let mut attempts = Vec::new();
    let command_path = Path::new(command);

    let candidates: Vec<PathBuf> = if command_path.is_absolute() {
        vec![command_path.to_path_buf()]
    } else if command_path.components().count() > 1 {
        let base = ctx
            .working_dir
            .map(Path::to_path_buf)
            .or_else(|| env::current_dir().ok())
            .unwrap_or_default();
        vec![base.join(command_path)]
    } else {
        search_dirs(ctx)
            .into_iter()
            .flat_map(|dir| candidate_names(command).into_iter().map(move |n| dir.join(n)))
            .collect()
    };

    for candidate in candidates {
        let outcome = fs.check_executable(&candidate);
        let ok = outcome == AttemptOutcome::Ok;
        attempts.push(Attempt {
            candidate: candidate.clone(),
            outcome,
        });
        if ok {
            return Ok(Resolved {
                path: candidate,
                attempts,
            });
        }
    }

    Err(ResolveError::not_resolved(command, &attempts))
}

fn search_dirs(ctx: SearchContext<'_>) -> Vec<PathBuf> {
    let extra = ctx
        .path_extra
        .map(|p| env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();
    let system = ctx
        .path_var
        .map(|p| env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();

    dedupe(extra.into_iter().chain(system))
}

#[cfg(windows)]
fn candidate_names(command: &str) -> Vec<String> {
    if Path::new(command).extension().is_some() {
        return vec![command.to_string()];
    }
    ["exe", "cmd", "bat"]
        .iter()
        .map(|ext| format!("{command}.{ext}"))
        .collect()
}

#[cfg(not(windows))]
fn candidate_names(command: &str) -> Vec<String> {
    vec![command.to_string()]
}

fn dedupe(entries: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.as_os_str().is_empty())
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

/// Build the child's `PATH`: the executable's directory, `path_extra`, then
/// the host's `PATH`, deduplicated in that order.
pub fn build_effective_path(
    exe: &Path,
    path_extra: Option<&str>,
    path_var: Option<&OsStr>,
) -> Result<OsString, env::JoinPathsError> {
    let exe_dir = exe.parent().map(Path::to_path_buf);
    let extra = path_extra
        .map(|p| env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();
    let system = path_var
        .map(|p| env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();

    env::join_paths(dedupe(exe_dir.into_iter().chain(extra).chain(system)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockFs {
        executables: HashSet<PathBuf>,
        non_executables: HashSet<PathBuf>,
    }

    impl MockFs {
        fn with_executable(mut self, path: &str) -> Self {
            self.executables.insert(PathBuf::from(path));
            self
        }

        fn with_non_executable(mut self, path: &str) -> Self {
            self.non_executables.insert(PathBuf::from(path));
            self
        }
    }

    impl FsProvider for MockFs {
        fn check_executable(&self, path: &Path) -> AttemptOutcome {
            if self.executables.contains(path) {
                AttemptOutcome::Ok
            } else if self.non_executables.contains(path) {
                AttemptOutcome::NotExecutable
            } else {
                AttemptOutcome::NotFound
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_bare_name_searches_extra_then_path() {
        let fs = MockFs::default()
            .with_non_executable("/opt/tools/node")
            .with_executable("/usr/bin/node");
        let ctx = SearchContext {
            path_extra: Some("/opt/tools"),
            path_var: Some(OsStr::new("/bin:/usr/bin")),
            ..SearchContext::default()
        };

        let resolved = resolve_executable("node", ctx, &fs).unwrap();
        assert_eq!(resolved.path, PathBuf::from("/usr/bin/node"));
        assert_eq!(resolved.attempts.len(), 3);
        assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::NotExecutable);
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_command_uses_working_dir() {
        let fs = MockFs::default().with_executable("/srv/app/bin/server");
        let ctx = SearchContext {
            working_dir: Some(Path::new("/srv/app")),
            ..SearchContext::default()
        };
        let resolved = resolve_executable("./bin/server", ctx, &fs).unwrap();
        assert_eq!(resolved.path, PathBuf::from("/srv/app/./bin/server"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_lists_attempts() {
        let ctx = SearchContext {
            path_var: Some(OsStr::new("/a:/b")),
            ..SearchContext::default()
        };
        let err = resolve_executable("missing", ctx, &MockFs::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/a/missing: not found"));
        assert!(msg.contains("/b/missing: not found"));
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(
            resolve_executable(" ", SearchContext::default(), &SystemFs),
            Err(ResolveError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_effective_path_order_and_dedupe() {
        let path = build_effective_path(
            Path::new("/usr/bin/node"),
            Some("/custom:/usr/bin"),
            Some(OsStr::new("/usr/bin:/bin")),
        )
        .unwrap();
        assert_eq!(path, OsString::from("/usr/bin:/custom:/bin"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_fs_on_real_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(SystemFs.check_executable(dir.path()), AttemptOutcome::NotAFile);
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(SystemFs.check_executable(&file), AttemptOutcome::NotExecutable);
        assert_eq!(
            SystemFs.check_executable(&dir.path().join("nope")),
            AttemptOutcome::NotFound
        );
    }
}
