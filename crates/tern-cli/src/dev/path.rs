//! Root-relative served paths.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A `/`-separated path relative to the project root, always written with a
/// leading `./` (`./src/app.ts`).
///
/// This is the key for both the artifact cache and the watch set. It can only
/// be built from sanitized input, so joining it onto the root never escapes
/// the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServedPath(String);

impl ServedPath {
    /// The entry document, `./index.html`.
    pub fn entry_document() -> Self {
        Self("./index.html".to_string())
    }

    /// Build from a decoded URL path such as `/src/app.ts`.
    ///
    /// Empty and `.` segments are dropped. Returns `None` for a path with no
    /// segments left, or one containing `..`, a backslash or a NUL byte.
    pub fn from_request(path: &str) -> Option<Self> {
        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s if s.contains('\\') || s.contains('\0') => return None,
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self(format!("./{}", segments.join("/"))))
    }

    /// Map an absolute file system path back to a served path.
    ///
    /// Returns `None` for paths outside `root` or with non-UTF-8 components.
    pub fn from_fs_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self(format!("./{}", segments.join("/"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path without its `./` marker (`src/app.ts`).
    pub fn relative(&self) -> &str {
        &self.0[2..]
    }

    /// Location of this path on disk under `root`.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        root.join(self.relative())
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Extension of the final segment, `None` for `README` or `.env`.
    pub fn extension(&self) -> Option<&str> {
        Path::new(self.file_name()).extension()?.to_str()
    }

    /// Replace the final segment's extension (`./a.js` → `./a.ts`).
    pub fn with_extension(&self, extension: &str) -> Self {
        let stem_len = match self.extension() {
            Some(current) => self.0.len() - current.len() - 1,
            None => self.0.len(),
        };
        Self(format!("{}.{}", &self.0[..stem_len], extension))
    }

    /// Append an extension to the full path (`./util` → `./util.ts`).
    pub fn with_appended(&self, extension: &str) -> Self {
        Self(format!("{}.{}", self.0, extension))
    }
}

impl fmt::Display for ServedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
