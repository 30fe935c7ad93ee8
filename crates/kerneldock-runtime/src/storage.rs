//! Leak-resistant storage for connection files.
//!
//! Connection directories live under the user's runtime directory, which
//! some systems sweep periodically. Setting the sticky bit on the files and
//! directories we create opts them out of those sweeps. The marker is best
//! effort: every outcome is reported as a value and logged by the caller.

use std::path::{Path, PathBuf};

use kerneldock_common::constants;
use kerneldock_common::error::{KernelDockError, Result};
use tempfile::TempDir;

/// Whether a marked path belongs to us or to someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    /// Created by this process.
    Owned,
    /// Parent directory we may not own.
    Shared,
}

/// Result of applying the sticky marker to one path.
#[derive(Debug)]
pub enum MarkerOutcome {
    /// The bit was newly set.
    Applied,
    /// The bit was already present.
    AlreadySet,
    /// The platform has no sticky bit.
    Unsupported,
    /// Permission denied on a shared directory; ignored.
    NotOwned,
    /// Any other failure. Worth a warning, not an abort.
    Failed(std::io::Error),
}

/// Marker outcome for a single path.
#[derive(Debug)]
pub struct MarkerReport {
    /// Path the marker was applied to.
    pub path: PathBuf,
    /// Ownership role of the path.
    pub role: PathRole,
    /// What happened.
    pub outcome: MarkerOutcome,
}

/// Classifies a failure to set the sticky bit.
#[must_use]
pub fn classify_marker_error(err: std::io::Error, role: PathRole) -> MarkerOutcome {
    if role == PathRole::Shared && err.raw_os_error() == Some(libc::EPERM) {
        MarkerOutcome::NotOwned
    } else {
        MarkerOutcome::Failed(err)
    }
}

/// Sets the sticky bit on `path` and on its parent directory.
pub fn set_sticky_bit(path: &Path) -> Vec<MarkerReport> {
    let mut targets = vec![(path.to_path_buf(), PathRole::Owned)];
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        targets.push((parent.to_path_buf(), PathRole::Shared));
    }
    targets
        .into_iter()
        .map(|(path, role)| {
            let outcome = apply_marker(&path, role);
            MarkerReport {
                path,
                role,
                outcome,
            }
        })
        .collect()
}

#[cfg(unix)]
fn apply_marker(path: &Path, role: PathRole) -> MarkerOutcome {
    use std::os::unix::fs::PermissionsExt;

    let sticky = u32::from(libc::S_ISVTX);
    let mode = match std::fs::metadata(path) {
        Ok(meta) => meta.permissions().mode(),
        Err(e) => return classify_marker_error(e, role),
    };
    if mode & sticky != 0 {
        return MarkerOutcome::AlreadySet;
    }
    match std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | sticky)) {
        Ok(()) => MarkerOutcome::Applied,
        Err(e) => classify_marker_error(e, role),
    }
}

#[cfg(not(unix))]
fn apply_marker(_path: &Path, _role: PathRole) -> MarkerOutcome {
    MarkerOutcome::Unsupported
}

/// Function that applies the sticky marker to a path and its parent.
pub type MarkerFn = fn(&Path) -> Vec<MarkerReport>;

/// Applies the sticky marker, logs anything worth knowing about, and
/// returns the per-path reports.
pub(crate) fn mark_and_log(path: &Path, marker: MarkerFn) -> Vec<MarkerReport> {
    let reports = marker(path);
    for report in &reports {
        match &report.outcome {
            MarkerOutcome::Failed(e) => tracing::warn!(
                path = %report.path.display(),
                error = %e,
                "failed to set sticky bit; runtime files may be cleaned up periodically"
            ),
            MarkerOutcome::NotOwned => tracing::debug!(
                path = %report.path.display(),
                "not permitted to set sticky bit on shared directory"
            ),
            MarkerOutcome::Applied | MarkerOutcome::AlreadySet | MarkerOutcome::Unsupported => {}
        }
    }
    reports
}

/// Transient directory holding one kernel's connection file.
///
/// Until [`persist`](Self::persist) is called, dropping it removes the
/// directory, which covers launch failures. A persisted directory is only
/// removed by [`release`](Self::release) and otherwise outlives its owner.
#[derive(Debug)]
pub struct ScopedDirectory {
    path: PathBuf,
    guard: Option<TempDir>,
    markers: Vec<MarkerReport>,
}

impl ScopedDirectory {
    /// Creates `parent` if needed and a fresh, uniquely named directory in it.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub fn acquire(parent: &Path) -> Result<Self> {
        Self::acquire_with(parent, set_sticky_bit)
    }

    /// Like [`acquire`](Self::acquire), marking paths with `marker`.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created. Marker
    /// failures are only recorded.
    pub fn acquire_with(parent: &Path, marker: MarkerFn) -> Result<Self> {
        std::fs::create_dir_all(parent).map_err(|e| KernelDockError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
        let mut markers = mark_and_log(parent, marker);

        let dir = tempfile::Builder::new()
            .prefix(constants::CONNECTION_DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| KernelDockError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        markers.extend(mark_and_log(dir.path(), marker));
        tracing::debug!(path = %dir.path().display(), "connection directory acquired");
        Ok(Self {
            path: dir.path().to_path_buf(),
            guard: Some(dir),
            markers,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Marker reports recorded while acquiring the directory.
    #[must_use]
    pub fn markers(&self) -> &[MarkerReport] {
        &self.markers
    }

    /// Returns true if dropping this value still removes the directory.
    #[must_use]
    pub const fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }

    /// Stops removal on drop. The directory then lives until released.
    #[must_use]
    pub fn persist(mut self) -> Self {
        if let Some(dir) = self.guard.take() {
            let _ = dir.keep();
        }
        self
    }

    /// Recursively removes the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails; the directory may be left behind.
    pub fn release(mut self) -> Result<()> {
        let removed = match self.guard.take() {
            Some(dir) => dir.close(),
            None => std::fs::remove_dir_all(&self.path),
        };
        removed.map_err(|e| KernelDockError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %self.path.display(), "connection directory released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eperm_on_shared_parent_is_ignored() {
        let err = std::io::Error::from_raw_os_error(libc::EPERM);
        assert!(matches!(
            classify_marker_error(err, PathRole::Shared),
            MarkerOutcome::NotOwned
        ));
    }

    #[test]
    fn eperm_on_owned_path_is_a_failure() {
        let err = std::io::Error::from_raw_os_error(libc::EPERM);
        assert!(matches!(
            classify_marker_error(err, PathRole::Owned),
            MarkerOutcome::Failed(_)
        ));
    }

    #[test]
    fn other_errors_on_shared_parent_are_failures() {
        let err = std::io::Error::from_raw_os_error(libc::ENOENT);
        assert!(matches!(
            classify_marker_error(err, PathRole::Shared),
            MarkerOutcome::Failed(_)
        ));
    }

    #[test]
    fn marker_covers_path_and_parent() {
        let root = tempfile::tempdir().expect("tempdir");
        let file = root.path().join("kernel.json");
        std::fs::write(&file, "{}").expect("write");
        let reports = set_sticky_bit(&file);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].path, file);
        assert_eq!(reports[0].role, PathRole::Owned);
        assert_eq!(reports[1].path, root.path());
        assert_eq!(reports[1].role, PathRole::Shared);
    }

    #[test]
    fn marker_on_missing_path_degrades_to_failure() {
        let root = tempfile::tempdir().expect("tempdir");
        let reports = set_sticky_bit(&root.path().join("missing"));
        assert!(matches!(reports[0].outcome, MarkerOutcome::Failed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn marker_sets_sticky_bit() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("kernels");
        std::fs::create_dir(&dir).expect("mkdir");
        let reports = set_sticky_bit(&dir);
        assert!(matches!(reports[0].outcome, MarkerOutcome::Applied));
        let mode = std::fs::metadata(&dir).expect("stat").permissions().mode();
        assert_ne!(mode & u32::from(libc::S_ISVTX), 0);

        let again = set_sticky_bit(&dir);
        assert!(matches!(again[0].outcome, MarkerOutcome::AlreadySet));
    }

    #[test]
    fn acquire_creates_parent_and_unique_dirs() {
        let root = tempfile::tempdir().expect("tempdir");
        let parent = root.path().join("docker_kernels");
        let a = ScopedDirectory::acquire(&parent).expect("acquire a");
        let b = ScopedDirectory::acquire(&parent).expect("acquire b");
        assert!(parent.is_dir());
        assert!(a.path().is_dir());
        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().parent(), Some(parent.as_path()));
    }

    #[test]
    fn release_removes_directory_and_contents() {
        let root = tempfile::tempdir().expect("tempdir");
        let scoped = ScopedDirectory::acquire(root.path()).expect("acquire");
        let path = scoped.path().to_path_buf();
        std::fs::write(path.join("kernel.json"), "{}").expect("write");
        scoped.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn persisted_directory_survives_drop() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = {
            let scoped = ScopedDirectory::acquire(root.path()).expect("acquire").persist();
            assert!(!scoped.is_guarded());
            scoped.path().to_path_buf()
        };
        assert!(path.is_dir());
    }

    #[test]
    fn persisted_directory_is_removed_on_release() {
        let root = tempfile::tempdir().expect("tempdir");
        let scoped = ScopedDirectory::acquire(root.path()).expect("acquire").persist();
        let path = scoped.path().to_path_buf();
        std::fs::write(path.join("kernel.json"), "{}").expect("write");
        scoped.release().expect("release");
        assert!(!path.exists());
    }

    fn denied_on_shared(path: &Path) -> Vec<MarkerReport> {
        let mut reports = vec![MarkerReport {
            path: path.to_path_buf(),
            role: PathRole::Owned,
            outcome: MarkerOutcome::Applied,
        }];
        if let Some(parent) = path.parent() {
            reports.push(MarkerReport {
                path: parent.to_path_buf(),
                role: PathRole::Shared,
                outcome: classify_marker_error(
                    std::io::Error::from_raw_os_error(libc::EPERM),
                    PathRole::Shared,
                ),
            });
        }
        reports
    }

    #[test]
    fn acquire_records_every_marker_report() {
        let root = tempfile::tempdir().expect("tempdir");
        let parent = root.path().join("docker_kernels");
        let scoped = ScopedDirectory::acquire_with(&parent, denied_on_shared).expect("acquire");
        let markers = scoped.markers();
        assert_eq!(markers.len(), 4);
        assert_eq!(markers[0].path, parent);
        assert_eq!(markers[2].path, scoped.path());
        assert!(
            markers
                .iter()
                .filter(|m| m.role == PathRole::Shared)
                .all(|m| matches!(m.outcome, MarkerOutcome::NotOwned))
        );
    }

    #[test]
    fn drop_removes_unreleased_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = {
            let scoped = ScopedDirectory::acquire(root.path()).expect("acquire");
            scoped.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
