//! C9 — Temp File Sweeper: a background ticker that deletes stale upload
//! scratch files. Safety net only; the request path removes its own files on
//! completion. Structurally mirrors the teacher's `retention::spawn_retention_task`.
//! See SPEC_FULL.md §4.9.

use std::path::Path;
use std::time::{Duration, SystemTime};

const INITIAL_GRACE_SECS: u64 = 30;

pub fn spawn(temp_dir_root: String, max_age_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(INITIAL_GRACE_SECS)).await;

        let interval = Duration::from_secs((max_age_secs / 2).max(1));
        loop {
            let swept = sweep_once(&temp_dir_root, max_age_secs);
            if swept > 0 {
                eprintln!("🧹 Sweep: removed {swept} stale upload file(s) from {temp_dir_root}");
            }
            tokio::time::sleep(interval).await;
        }
    });
}

/// Delete regular files under `dir` whose mtime is older than `max_age_secs`.
/// Returns the number of files removed. Missing directories are not an error.
fn sweep_once(dir: &str, max_age_secs: u64) -> usize {
    let entries = match std::fs::read_dir(Path::new(dir)) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else { continue };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else { continue };
        let age = SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO);
        if age.as_secs() > max_age_secs && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}
