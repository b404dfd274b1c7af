use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::AuditError;
use crate::filters::ClientFileFilter;
use crate::types::CodeUsage;

/// Counts literal occurrences of `endpoint` in client files under every root.
///
/// Every root is checked before any file is read; a missing root aborts the
/// scan. Files that cannot be read are logged and skipped.
pub fn scan_references(
    endpoint: &str,
    roots: &[PathBuf],
    filter: &ClientFileFilter,
) -> Result<CodeUsage, AuditError> {
    for root in roots {
        if !root.is_dir() {
            return Err(AuditError::ProjectPathNotFound { path: root.clone() });
        }
    }

    let mut files = BTreeSet::new();
    let mut matches_count = 0usize;

    if !endpoint.is_empty() {
        let pattern = Regex::new(&regex::escape(endpoint))
            .map_err(|e| AuditError::Config(format!("Cannot search for endpoint '{endpoint}': {e}")))?;

        for root in roots {
            for path in client_files(root, filter) {
                match count_in_file(&path, &pattern) {
                    Ok(0) => {}
                    Ok(n) => {
                        matches_count += n;
                        files.insert(path.display().to_string());
                    }
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
                    }
                }
            }
        }
    }

    tracing::debug!(endpoint, matches_count, files = files.len(), "reference scan finished");

    Ok(CodeUsage {
        projects_paths: roots.iter().map(|r| r.display().to_string()).collect(),
        matches_count,
        files,
    })
}

/// Client files below `root`, in file-name order for a stable walk.
fn client_files(root: &Path, filter: &ClientFileFilter) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || e.file_name().to_str().map_or(true, |n| filter.allows_dir(n))
        })
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| !e.file_type().is_dir() && filter.is_client_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Non-overlapping literal matches. Invalid UTF-8 is replaced, not rejected.
fn count_in_file(path: &Path, pattern: &Regex) -> std::io::Result<usize> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(pattern.find_iter(&text).count())
}
