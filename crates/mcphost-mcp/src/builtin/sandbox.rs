//! Path confinement for built-in tools.

use std::io;
use std::path::{Component, Path, PathBuf};

use mcphost_core::HostError;

/// An allowed root directory. Every path handed to a built-in tool must
/// resolve inside it, after symlinks are followed.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sandbox root is not a directory: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a user-supplied path to an absolute path inside the root.
    ///
    /// Relative paths are taken relative to the root. The target does not
    /// need to exist. Existing components are walked one at a time and every
    /// symlink among them is followed, so the result contains no links. A
    /// dangling symlink is rejected, since writing through it would create
    /// its target wherever it points.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, HostError> {
        let outside = || HostError::Sandbox {
            path: requested.to_string(),
        };

        let joined = if Path::new(requested).is_absolute() {
            PathBuf::from(requested)
        } else {
            self.root.join(requested)
        };
        let normalized = normalize(&joined).ok_or_else(outside)?;

        let resolved = follow_links(&normalized).ok_or_else(outside)?;

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(outside())
        }
    }

    /// Path relative to the root, for display.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

/// Lexically resolve `.` and `..`. None if `..` climbs above the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Follow symlinks through the existing prefix of `path`; the missing tail
/// is appended as-is. None for a dangling link.
fn follow_links(path: &Path) -> Option<PathBuf> {
    let mut real = PathBuf::new();
    let mut components = path.components();
    for component in components.by_ref() {
        let candidate = real.join(component);
        match candidate.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => real = candidate.canonicalize().ok()?,
            Ok(_) => real = candidate,
            Err(_) => {
                real = candidate;
                break;
            }
        }
    }
    Some(components.fold(real, |acc, part| acc.join(part)))
}
