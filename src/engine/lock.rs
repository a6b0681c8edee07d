use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::EngineError;

/// Exclusive advisory lock held for the duration of a pipeline run.
///
/// Acquisition never blocks: a second writer gets `EngineError::LockUnavailable`.
/// Released when dropped, including on panic unwind or process exit.
#[derive(Debug)]
pub struct WriterLock {
    file: File,
    path: PathBuf
}

impl WriterLock {
    pub fn acquire(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| EngineError::io(parent, error))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|error| EngineError::io(path, error))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            // SAFETY: the descriptor is owned by `file` and stays open for the call.
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

            if result != 0 {
                let error = std::io::Error::last_os_error();

                if error.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(EngineError::LockUnavailable(path.to_path_buf()));
                }
                return Err(EngineError::io(path, error));
            }
        }

        // The holder's pid is informational only.
        file.set_len(0).map_err(|error| EngineError::io(path, error))?;
        let mut writer = &file;
        let _ = write!(writer, "{}", std::process::id());

        debug!("Acquired writer lock [{}]", path.display());

        Ok(Self { file, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            // SAFETY: the descriptor is still owned by `self.file`.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }

        //NOTE: The lock file is left in place. Unlinking it would let a waiting process lock a
        //      deleted inode while a newcomer locks a fresh file at the same path.
        debug!("Released writer lock [{}]", self.path.display());
    }
}
