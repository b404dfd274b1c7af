use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::Path;

/// Substring a file name must contain to be treated as client/adapter code.
pub const CLIENT_MARKER: &str = "Client";

/// Version-control metadata is never walked.
static EXCLUDED_DIRS: Lazy<HashSet<&'static str>> = Lazy::new(|| HashSet::from([
    ".git", ".svn", ".hg",
]));

const DEFAULT_EXTENSIONS: &[&str] = &["java"];

/// Which files under a project root are candidates for the reference scan.
#[derive(Debug, Clone)]
pub struct ClientFileFilter {
    extensions: Vec<String>,
    extra_exclude_dirs: HashSet<String>,
}

impl Default for ClientFileFilter {
    fn default() -> Self {
        ClientFileFilter {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            extra_exclude_dirs: HashSet::new(),
        }
    }
}

impl ClientFileFilter {
    /// Empty `extensions` keeps the default (`java`). Leading dots are accepted.
    pub fn new(extensions: &[String], extra_exclude_dirs: &[String]) -> Self {
        let mut filter = ClientFileFilter::default();
        if !extensions.is_empty() {
            filter.extensions = extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect();
        }
        filter.extra_exclude_dirs = extra_exclude_dirs.iter().cloned().collect();
        filter
    }

    /// Whether the walker should descend into a directory with this name.
    pub fn allows_dir(&self, name: &str) -> bool {
        !EXCLUDED_DIRS.contains(name) && !self.extra_exclude_dirs.contains(name)
    }

    /// Source file whose name contains [`CLIENT_MARKER`] (case-sensitive).
    pub fn is_client_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !name.contains(CLIENT_MARKER) {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|allowed| *allowed == e))
    }
}
