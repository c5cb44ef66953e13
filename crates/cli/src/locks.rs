//! Lock file management for dispatcher exclusivity

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lock acquisition failures
#[derive(Debug, Error)]
pub enum LockError {
    #[error("dispatcher already running (pid {pid}); stop it with 'pd stop' first")]
    AlreadyRunning { pid: u32 },

    #[error("lock file error: {0}")]
    Io(#[from] io::Error),
}

/// Lock file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    /// Unix milliseconds
    pub started_at: u64,
    /// Directory the owner is watching
    pub watch_dir: PathBuf,
}

impl LockOwner {
    pub fn is_alive(&self) -> bool {
        is_process_alive(self.pid)
    }
}

/// Exclusive repository lock held by a running dispatcher
///
/// The file is flock-held for the lifetime of the value and removed on drop.
#[derive(Debug)]
pub struct DispatcherLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

impl DispatcherLock {
    /// Acquire the lock at `lock_path`
    ///
    /// Fails with [`LockError::AlreadyRunning`] if a live process holds it.
    /// A lock left behind by a dead process is reclaimed.
    pub fn acquire(lock_path: &Path, watch_dir: &Path) -> Result<Self, LockError> {
        Self::acquire_inner(lock_path, watch_dir, true)
    }

    fn acquire_inner(lock_path: &Path, watch_dir: &Path, may_retry: bool) -> Result<Self, LockError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(lock_path)?;

        if !try_flock_exclusive(&file)? {
            // Lock held - check if stale
            let owner = read_lock_content(&mut file).ok();
            match owner {
                Some(owner) if owner.is_alive() || !may_retry => {
                    return Err(LockError::AlreadyRunning { pid: owner.pid });
                }
                _ if may_retry => {
                    tracing::warn!(path = %lock_path.display(), "Removing stale dispatcher lock");
                    drop(file);
                    std::fs::remove_file(lock_path)?;
                    return Self::acquire_inner(lock_path, watch_dir, false);
                }
                _ => return Err(LockError::AlreadyRunning { pid: 0 }),
            }
        }

        if let Ok(previous) = read_lock_content(&mut file) {
            if previous.pid != std::process::id() {
                tracing::warn!(pid = previous.pid, "Reclaiming lock left by a dead dispatcher");
            }
        }

        write_lock_content(&mut file, watch_dir)?;

        Ok(Self {
            path: lock_path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DispatcherLock {
    fn drop(&mut self) {
        // Ensure lock file is removed on drop
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Owner recorded in the lock file at `lock_path`, if any
///
/// Does not take the lock; the owner may be dead (check [`LockOwner::is_alive`]).
pub fn read_owner(lock_path: &Path) -> Option<LockOwner> {
    let mut file = File::open(lock_path).ok()?;
    read_lock_content(&mut file).ok()
}

/// Write lock content (PID + timestamp + watch dir)
fn write_lock_content(file: &mut File, watch_dir: &Path) -> io::Result<()> {
    let content = LockOwner {
        pid: std::process::id(),
        started_at: current_timestamp_ms(),
        watch_dir: watch_dir.to_path_buf(),
    };

    let serialized = serde_json::to_string(&content)?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Read lock content from file
fn read_lock_content(file: &mut File) -> io::Result<LockOwner> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Check if process is alive
#[cfg(target_os = "macos")]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Null signal checks existence without delivering anything
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true, // Permission denied or other - assume alive
    }
}

#[cfg(target_os = "linux")]
pub fn is_process_alive(pid: u32) -> bool {
    // Check /proc/<pid> directory exists
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn is_process_alive(_pid: u32) -> bool {
    // Conservative: assume process is alive on unknown platforms
    true
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
