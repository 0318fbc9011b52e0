use genome_core::{GenomeError, Result};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Enumerate and read repository files with the exclusion policy applied.
/// Paths are repo-relative with forward slashes.
pub trait FilesystemSource: Send + Sync {
    fn root(&self) -> &Path;
    fn enumerate(&self) -> Result<Vec<String>>;
    fn read(&self, rel: &str) -> Result<Vec<u8>>;
}

/// Production filesystem source: gitignore-aware walk plus configured
/// exclusion globs.
pub struct WalkSource {
    root: PathBuf,
    exclude: Vec<String>,
}

impl WalkSource {
    pub fn new(root: impl AsRef<Path>, exclude: Vec<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclude,
        }
    }
}

impl FilesystemSource for WalkSource {
    fn root(&self) -> &Path {
        &self.root
    }

    fn enumerate(&self) -> Result<Vec<String>> {
        let mut overrides = OverrideBuilder::new(&self.root);
        for pattern in &self.exclude {
            // Override globs are include-lists; a leading '!' excludes.
            overrides
                .add(&format!("!{pattern}"))
                .map_err(|e| GenomeError::InvalidInput(format!("bad exclude pattern: {e}")))?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| GenomeError::InvalidInput(format!("bad exclude patterns: {e}")))?;

        let mut files = Vec::new();
        for entry in WalkBuilder::new(&self.root)
            .hidden(false)
            .overrides(overrides)
            .filter_entry(|e| e.file_name().to_str() != Some(".git"))
            .build()
        {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| ft.is_file()) {
                        if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                            files.push(rel.to_string_lossy().replace('\\', "/"));
                        }
                    }
                }
                Err(err) => log::warn!("walk error: {err}"),
            }
        }
        // Deterministic ordering is load-bearing: the idempotent-scan
        // property compares serialized artifacts byte for byte.
        files.sort();
        Ok(files)
    }

    fn read(&self, rel: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.root.join(rel))?)
    }
}

/// Change activity for one path over the history window.
#[derive(Debug, Clone, Default)]
pub struct FileActivity {
    pub change_count: usize,
    pub last_change: Option<String>,
    pub recent_messages: Vec<String>,
}

/// Last-modified date and change frequency per path, independent of any
/// specific VCS.
pub trait HistorySource: Send + Sync {
    fn available(&self) -> bool;
    fn file_activity(&self, rel: &str) -> Option<FileActivity>;
}

/// History source shelling out to the git CLI, bounded to a 90-day window.
pub struct GitHistory {
    root: PathBuf,
    window_days: u32,
}

impl GitHistory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            window_days: 90,
        }
    }
}

impl HistorySource for GitHistory {
    fn available(&self) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(["rev-parse", "HEAD"])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn file_activity(&self, rel: &str) -> Option<FileActivity> {
        let since = format!("--since={} days ago", self.window_days);
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(["log", &since, "--format=%ad|%s", "--date=short", "--"])
            .arg(rel)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut activity = FileActivity::default();
        for line in stdout.lines() {
            let Some((date, message)) = line.split_once('|') else {
                continue;
            };
            if activity.last_change.is_none() {
                activity.last_change = Some(date.to_string());
            }
            if activity.recent_messages.len() < 10 {
                activity.recent_messages.push(message.to_string());
            }
            activity.change_count += 1;
        }
        if activity.change_count == 0 {
            return None;
        }
        Some(activity)
    }
}

/// Source used when the repository has no usable history.
pub struct NullHistory;

impl HistorySource for NullHistory {
    fn available(&self) -> bool {
        false
    }

    fn file_activity(&self, _rel: &str) -> Option<FileActivity> {
        None
    }
}

/// Current time for `metadata.generated_at`.
pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_respects_exclusions_and_sorts() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("a.py"), "y = 2\n").unwrap();
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        std::fs::write(dir.path().join("dist/out.js"), "//\n").unwrap();

        let source = WalkSource::new(dir.path(), vec!["dist/**".into()]);
        let files = source.enumerate().unwrap();
        assert_eq!(files, vec!["a.py".to_string(), "b.py".to_string()]);
    }

    #[test]
    fn read_returns_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let source = WalkSource::new(dir.path(), vec![]);
        assert_eq!(source.read("a.py").unwrap(), b"x = 1\n");
    }
}
