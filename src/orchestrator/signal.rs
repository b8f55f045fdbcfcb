//! Cross-process pause/resume flag and the run-scoped stop signal.
//!
//! The resume protocol is the existence of a file. `raise` writes a temp file
//! and renames it into place; the waiter claims the flag by renaming it to a
//! unique name before deleting it, so one flag satisfies exactly one pause.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ResumeSignal {
    path: PathBuf,
}

impl ResumeSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_raised(&self) -> bool {
        self.path.exists()
    }

    /// Create the flag. Safe to call while a waiter is polling.
    pub fn raise(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.sibling(&format!("raise-{}", Uuid::new_v4()));
        fs::write(&tmp, chrono::Utc::now().to_rfc3339())?;
        fs::rename(&tmp, &self.path)
    }

    /// Try to take the flag. `Ok(true)` if this caller consumed it,
    /// `Ok(false)` if no flag is present.
    pub fn try_consume(&self) -> std::io::Result<bool> {
        let claimed = self.sibling(&format!("claimed-{}", Uuid::new_v4()));
        match fs::rename(&self.path, &claimed) {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&claimed) {
                    debug!(path = %claimed.display(), error = %e, "could not remove claimed flag");
                }
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Poll until the flag appears, then consume it.
    ///
    /// Returns false if `stop` was raised before the flag appeared.
    pub async fn wait_for_resume(&self, poll_interval: Duration, stop: &StopSignal) -> bool {
        let mut warned = false;
        loop {
            match self.try_consume() {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) if !warned => {
                    warn!(path = %self.path.display(), error = %e, "cannot claim resume flag");
                    warned = true;
                }
                Err(e) => debug!(error = %e, "cannot claim resume flag"),
            }
            if stop.is_requested() {
                return false;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Remove a stale flag left from an earlier run.
    pub fn clear(&self) -> std::io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "resume.signal".into());
        name.push(format!(".{}", suffix));
        self.path.with_file_name(name)
    }
}

/// Run-scoped "stop requested" flag. Checked between jobs, never preemptive.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_raise_and_consume_once() {
        let dir = tempdir().unwrap();
        let signal = ResumeSignal::new(dir.path().join("resume.signal"));
        assert!(!signal.is_raised());

        signal.raise().unwrap();
        assert!(signal.is_raised());
        assert!(signal.try_consume().unwrap());
        assert!(!signal.is_raised());
        // A consumed flag cannot satisfy a second pause.
        assert!(!signal.try_consume().unwrap());
    }

    #[test]
    fn test_consume_leaves_no_files_behind() {
        let dir = tempdir().unwrap();
        let signal = ResumeSignal::new(dir.path().join("resume.signal"));
        signal.raise().unwrap();
        assert!(signal.try_consume().unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_raise_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let signal = ResumeSignal::new(dir.path().join("nested/dir/resume.signal"));
        signal.raise().unwrap();
        assert!(signal.is_raised());
    }

    #[test]
    fn test_clear_reports_whether_flag_existed() {
        let dir = tempdir().unwrap();
        let signal = ResumeSignal::new(dir.path().join("resume.signal"));
        assert!(!signal.clear().unwrap());
        std::fs::write(signal.path(), "").unwrap();
        assert!(signal.clear().unwrap());
        assert!(!signal.is_raised());
    }

    #[tokio::test]
    async fn test_wait_returns_when_flag_raised_later() {
        let dir = tempdir().unwrap();
        let signal = ResumeSignal::new(dir.path().join("resume.signal"));
        let raiser = signal.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            raiser.raise().unwrap();
        });

        let resumed = signal
            .wait_for_resume(Duration::from_millis(5), &StopSignal::new())
            .await;
        handle.await.unwrap();
        assert!(resumed);
        assert!(!signal.is_raised());
    }

    #[tokio::test]
    async fn test_wait_gives_up_on_stop() {
        let dir = tempdir().unwrap();
        let signal = ResumeSignal::new(dir.path().join("resume.signal"));
        let stop = StopSignal::new();
        stop.request();
        let resumed = signal
            .wait_for_resume(Duration::from_millis(1), &stop)
            .await;
        assert!(!resumed);
    }

    #[tokio::test]
    async fn test_unclaimable_flag_is_an_error_not_absence() {
        let dir = tempdir().unwrap();
        // The flag's parent is a regular file, so the rename fails with
        // something other than NotFound.
        std::fs::write(dir.path().join("not-a-dir"), "").unwrap();
        let signal = ResumeSignal::new(dir.path().join("not-a-dir/resume.signal"));

        let err = signal.try_consume().unwrap_err();
        assert_ne!(err.kind(), std::io::ErrorKind::NotFound);

        let stop = StopSignal::new();
        let stopper = stop.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.request();
        });
        let resumed = signal
            .wait_for_resume(Duration::from_millis(1), &stop)
            .await;
        handle.await.unwrap();
        assert!(!resumed);
    }

    #[test]
    fn test_stop_signal_is_shared_between_clones() {
        let stop = StopSignal::new();
        let other = stop.clone();
        assert!(!other.is_requested());
        stop.request();
        assert!(other.is_requested());
    }
}
