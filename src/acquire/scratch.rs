//! A per-fetch scratch directory, cleaned up on drop.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::config::AcquireConfig;
use crate::model::{PlayerId, Slot};

/// An owned scratch directory for one database/analysis acquisition. The
/// directory (and everything under it) is removed when this value is
/// dropped, so callers never need to remember to clean up on every error
/// path.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a freshly-named scratch directory under `config.scratch_base`
    /// (or the OS temp directory), named
    /// `tracklink-core-player{N}-{slot}-{random}` so concurrent acquisitions
    /// for different players/slots never collide.
    pub fn create(config: &AcquireConfig, player: PlayerId, slot: Slot) -> std::io::Result<Self> {
        let base = config
            .scratch_base
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let suffix: u64 = rand::rng().random();
        let dir_name = format!(
            "tracklink-core-player{player}-{}-{suffix:016x}",
            slot_label(slot)
        );
        let path = base.join(dir_name);
        std::fs::create_dir_all(&path)?;
        tracing::debug!(target: "acquire::scratch", path = %path.display(), "created scratch directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    target: "acquire::scratch",
                    path = %self.path.display(),
                    error = %e,
                    "failed to clean up scratch directory"
                );
            }
        }
    }
}

fn slot_label(slot: Slot) -> &'static str {
    match slot {
        Slot::Cd => "cd",
        Slot::Sd => "sd",
        Slot::Usb => "usb",
        Slot::Collection => "collection",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_makes_a_unique_directory_under_the_base() {
        let base = TempDir::new().unwrap();
        let config = AcquireConfig {
            scratch_base: Some(base.path().to_path_buf()),
        };
        let a = ScratchDir::create(&config, 1, Slot::Usb).unwrap();
        let b = ScratchDir::create(&config, 1, Slot::Usb).unwrap();
        assert!(a.path().exists());
        assert!(b.path().exists());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn dropping_removes_the_directory() {
        let base = TempDir::new().unwrap();
        let config = AcquireConfig {
            scratch_base: Some(base.path().to_path_buf()),
        };
        let path = {
            let dir = ScratchDir::create(&config, 2, Slot::Sd).unwrap();
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
