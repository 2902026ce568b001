// Recursive permission normalizer over walkdir
// reason: walkdir for post-order traversal, spawn_blocking keeps the runtime free
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use vsl_core::port::{PermissionJob, PermissionNormalizer, ProgressReporter, WalkError, WalkSignal};

/// Walks each root post-order on the blocking pool and applies the job's mode
#[derive(Debug, Default, Clone)]
pub struct WalkdirNormalizer;

impl WalkdirNormalizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PermissionNormalizer for WalkdirNormalizer {
    async fn normalize(&self, job: PermissionJob, progress: ProgressReporter) -> WalkSignal {
        info!(roots = job.paths.len(), mode = %format!("{:o}", job.mode), "Normalizing permissions");

        match tokio::task::spawn_blocking(move || normalize_blocking(&job, &progress)).await {
            Ok(signal) => signal,
            Err(e) => WalkSignal::Failed(vec![WalkError::new("", format!("walker aborted: {}", e))]),
        }
    }
}

/// Synchronous walk: every root is attempted, errors are collected in order
pub fn normalize_blocking(job: &PermissionJob, progress: &ProgressReporter) -> WalkSignal {
    let total = job.paths.len().max(1);
    let mut errors = Vec::new();

    for (index, root) in job.paths.iter().enumerate() {
        // Anything that does not resolve counts as missing: ENOENT, ENOTDIR, dangling links
        if root.exists() {
            walk_root(root, job.mode, &mut errors);
        } else {
            debug!(path = %root.display(), "Skipping missing path");
        }
        progress.report((index + 1) as f64 / total as f64 * 100.0);
    }

    if errors.is_empty() {
        WalkSignal::Done
    } else {
        warn!(
            failures = errors.len(),
            first = %errors[0],
            "Permission walk finished with errors"
        );
        WalkSignal::Failed(errors)
    }
}

fn walk_root(root: &Path, mode: u32, errors: &mut Vec<WalkError>) {
    // contents_first: children are yielded before their directory
    let walker = WalkDir::new(root)
        .follow_root_links(false)
        .contents_first(true);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                errors.push(WalkError::new(path, e.to_string()));
                continue;
            }
        };

        if entry.path_is_symlink() {
            continue;
        }
        if let Err(e) = apply_mode(entry.path(), mode) {
            errors.push(WalkError::new(entry.path(), e.to_string()));
        }
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    // Only the owner-write bit has a portable meaning
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)
}
