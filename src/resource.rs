//! Resource classification
//!
//! Maps a decoded request path onto the strategy used to serve it. The first
//! path segment decides: `/static/...` goes through sendfile, `/dynamic/...`
//! through the kernel AIO engine, anything else is not found.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// Served with a zero-copy file to socket transfer
    Static,
    /// Served in chunks through overlapped read + write
    Dynamic,
    /// Not under any served folder
    None,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    static_folder: String,
    dynamic_folder: String,
}

impl Classifier {
    pub fn new(static_folder: impl Into<String>, dynamic_folder: impl Into<String>) -> Self {
        Self {
            static_folder: static_folder.into(),
            dynamic_folder: dynamic_folder.into(),
        }
    }

    /// Classifies `path` by its first segment.
    ///
    /// The folder must be followed by `/` and a non-empty remainder, so the
    /// folder itself (`/static/`) and lookalikes (`/staticfoo/x`,
    /// `/a/static/x`) are all [`ResourceType::None`].
    ///
    /// ```
    /// # use tideway::resource::{Classifier, ResourceType};
    /// let c = Classifier::new("static", "dynamic");
    /// assert_eq!(c.classify("/static/index.html"), ResourceType::Static);
    /// assert_eq!(c.classify("/dynamic/report.bin"), ResourceType::Dynamic);
    /// assert_eq!(c.classify("/missing/x"), ResourceType::None);
    /// ```
    pub fn classify(&self, path: &str) -> ResourceType {
        if under_folder(path, &self.static_folder) {
            ResourceType::Static
        } else if under_folder(path, &self.dynamic_folder) {
            ResourceType::Dynamic
        } else {
            ResourceType::None
        }
    }

    /// Maps a request path to a file below `root`.
    ///
    /// Returns `None` when the path tries to leave the root (`..`) or is not
    /// absolute.
    pub fn resolve(&self, root: &Path, path: &str) -> Option<PathBuf> {
        let relative = path.strip_prefix('/')?;
        let mut resolved = root.to_path_buf();

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return None;
                }
            }
        }

        Some(resolved)
    }
}

fn under_folder(path: &str, folder: &str) -> bool {
    path.strip_prefix('/')
        .and_then(|rest| rest.strip_prefix(folder))
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty())
}
