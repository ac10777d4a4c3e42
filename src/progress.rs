use std::{fs, path::Path};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Done,
}

/// Snapshot of a room batch, rewritten after every room.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress<'a> {
    /// Last room handled, `None` once the batch is done
    pub room: Option<&'a str>,
    pub current: usize,
    pub total: usize,
    /// Distinct tilemaps saved so far
    pub images_written: usize,
    /// Rooms that reused an earlier identical tilemap
    pub images_shared: usize,
    pub errors: usize,
    pub status: BatchStatus,
}

impl BatchProgress<'_> {
    /// Overwrites `path`. Failures are only logged, a batch never stops over
    /// its progress file.
    pub fn write(&self, path: &Path) {
        let result = serde_json::to_string(self)
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            log::debug!("Could not write progress to {}: {}", path.display(), e);
        }
    }
}
