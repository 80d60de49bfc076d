use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};
use tracing::warn;

use crate::Result;

/// Transient audio file owned by exactly one delivery.
///
/// The file is removed by `release`, or by `Drop` if the owner bails out
/// early, so no artifact outlives its send attempt.
#[derive(Debug)]
pub struct AudioArtifact {
    path: TempPath,
    len: usize,
}

impl AudioArtifact {
    /// Write `bytes` to a new uniquely named file in `dir`
    pub async fn write(dir: &Path, extension: &str, bytes: &[u8]) -> Result<Self> {
        let dir = dir.to_path_buf();
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let bytes = bytes.to_vec();
        let len = bytes.len();

        let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            let mut file = Builder::new()
                .prefix("semangat_tts_")
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        Ok(Self { path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the artifact back for upload
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&*self.path).await?)
    }

    /// Delete the file now; failures are logged since there is nothing left to do
    pub fn release(self) -> PathBuf {
        let path = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            warn!(target = "speech", path = ?path, error = %e, "Failed to delete audio artifact");
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn release_deletes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = AudioArtifact::write(dir.path(), "wav", b"RIFF....WAVE")
            .await
            .expect("artifact");
        assert!(artifact.path().exists());
        assert_eq!(artifact.read().await.expect("read"), b"RIFF....WAVE");
        assert!(artifact.file_name().ends_with(".wav"));

        let path = artifact.release();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_deletes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = AudioArtifact::write(dir.path(), ".mp3", b"ID3")
            .await
            .expect("artifact");
        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
    }
}
