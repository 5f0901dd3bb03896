use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOG_TARGET: &str = "     store";

/// Exclusive advisory lock on one store key, released when dropped.
#[derive(Debug)]
pub struct KeyLock(File);

impl KeyLock {
    /// Block until the lock file at `lock_path` can be locked exclusively.
    pub(super) fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .into_app_err_with(|| format!("opening lock file '{}'", lock_path.display()))?;

        file.lock_exclusive()
            .into_app_err_with(|| format!("acquiring exclusive lock on '{}'", lock_path.display()))?;
        log::trace!(target: LOG_TARGET, "Acquired lock '{}'", lock_path.display());

        Ok(Self(file))
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            log::warn!(target: LOG_TARGET, "Could not release store lock: {e:#}");
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn creates_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("op.lock");

        let lock = KeyLock::acquire(&path).unwrap();
        assert!(path.exists());
        drop(lock);

        // re-acquirable once released
        let _lock = KeyLock::acquire(&path).unwrap();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn serializes_holders() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Arc::new(tmp.path().join("op.lock"));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let path = Arc::clone(&path);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                std::thread::spawn(move || {
                    let _lock = KeyLock::acquire(&path).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = max_inside.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(core::time::Duration::from_millis(20));
                    let _ = inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
