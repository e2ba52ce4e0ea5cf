//! Per-run dump directory: one screenshot per step plus an append-only
//! execution log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::screen::EncodedImage;

pub const LOG_FILE_NAME: &str = "execution-log.txt";

#[derive(Debug)]
pub struct RunArtifacts {
    dir: PathBuf,
}

pub fn image_name(step: u64) -> String {
    format!("step{step:03}.png")
}

impl RunArtifacts {
    /// Create `root/run_YYYYmmdd_HHMMSS`.
    pub fn create(root: &Path) -> anyhow::Result<Self> {
        let stamp = chrono::Local::now().format("run_%Y%m%d_%H%M%S");
        let dir = root.join(stamp.to_string());
        fs::create_dir_all(&dir)
            .with_context(|| format!("create run directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    pub fn save_image(&self, step: u64, image: &EncodedImage) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(image_name(step));
        fs::write(&path, image.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn append_log(&self, image: &str, action: &str, story: &str) -> anyhow::Result<()> {
        let mut entry = format!(
            "=== {} | {} | {} ===\n{}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            std::process::id(),
            image,
            action
        );
        for line in story.lines() {
            entry.push_str("    ");
            entry.push_str(line);
            entry.push('\n');
        }
        entry.push('\n');

        let path = self.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(entry.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_entries_append() {
        let root = tempdir().unwrap();
        let run = RunArtifacts::create(root.path()).unwrap();
        assert!(run
            .dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("run_"));

        run.append_log("step001.png", "click", "first line\nsecond").unwrap();
        run.append_log("step002.png", "attend", "again").unwrap();
        let log = fs::read_to_string(run.log_path()).unwrap();
        assert_eq!(log.matches("=== ").count(), 2);
        assert!(log.contains("| step001.png ===\nclick\n    first line\n    second\n"));
        assert!(log.contains(&format!("| {} |", std::process::id())));
    }

    #[test]
    fn image_names_are_zero_padded() {
        assert_eq!(image_name(7), "step007.png");
        assert_eq!(image_name(1234), "step1234.png");
    }
}
