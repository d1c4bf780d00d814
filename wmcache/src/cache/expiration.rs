//! Per-style expiration index with debounced persistence.
//!
//! The index maps `style -> (quadkey -> expiration millis)`. It is a cache of
//! what the tile files already say about themselves, so losing it only costs
//! extra metadata reads. Each style's map is persisted as one `bincode` blob
//! under `<base>/serializedCaches/<style>`.
//!
//! Mutations schedule a single delayed persistence pass; further mutations
//! while a pass is pending are folded into it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::path::{index_path, is_valid_style_name, SERIALIZED_CACHES_DIR};

/// Default delay between the first unsaved mutation and the persistence pass.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_secs(120);

type StyleMap = Arc<DashMap<String, i64>>;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-wide expiration index shared by every tile of every style.
pub struct ExpirationIndex {
    base_dir: PathBuf,
    styles: DashMap<String, StyleMap>,
    save_pending: AtomicBool,
    save_delay: Duration,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl ExpirationIndex {
    /// Creates an empty index rooted at the cache base directory.
    ///
    /// Debounced saves are spawned on `runtime`.
    pub fn new(base_dir: impl Into<PathBuf>, save_delay: Duration, runtime: Handle) -> Self {
        Self {
            base_dir: base_dir.into(),
            styles: DashMap::new(),
            save_pending: AtomicBool::new(false),
            save_delay,
            runtime,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cache base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Enables or disables the in-memory index for a style.
    ///
    /// Enabling loads the serialized map from disk. A missing or unreadable
    /// file yields an empty map. Disabling drops the in-memory map without
    /// touching the file. Invalid style names are ignored.
    pub fn set_cache(&self, style: &str, enabled: bool) {
        if !is_valid_style_name(style) {
            warn!(style, "Ignoring expiration index for invalid map style name");
            return;
        }
        if !enabled {
            self.styles.remove(style);
            debug!(style, "Expiration index unloaded");
            return;
        }

        let path = index_path(&self.base_dir, style);
        let map = match load_map(&path) {
            Ok(map) => {
                info!(style, entries = map.len(), "Loaded expiration index");
                map
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(style, path = %path.display(), "No expiration index on disk");
                HashMap::new()
            }
            Err(e) => {
                warn!(style, path = %path.display(), error = %e, "Failed to read expiration index");
                HashMap::new()
            }
        };

        self.styles
            .insert(style.to_string(), Arc::new(map.into_iter().collect()));
    }

    /// Returns true if a map is held in memory for `style`.
    pub fn is_loaded(&self, style: &str) -> bool {
        self.styles.contains_key(style)
    }

    /// Indexed expiration of a tile, if known.
    pub fn get(&self, style: &str, id: &str) -> Option<i64> {
        let map = self.styles.get(style)?.clone();
        let value = map.get(id).map(|v| *v);
        value
    }

    /// Records a tile's expiration, creating the style's map if needed.
    pub fn record(&self, style: &str, id: &str, expiration: i64) {
        let map = self.styles.entry(style.to_string()).or_default().clone();
        map.insert(id.to_string(), expiration);
    }

    /// Number of entries held for a style.
    pub fn len(&self, style: &str) -> usize {
        self.styles.get(style).map(|m| m.len()).unwrap_or(0)
    }

    /// Drops every entry of a style while keeping the style loaded.
    pub fn remove_style_entries(&self, style: &str) {
        if let Some(map) = self.styles.get(style) {
            map.clear();
        }
    }

    /// Schedules a persistence pass after the save delay.
    ///
    /// No-op if a pass is already pending or the index is shut down.
    pub fn schedule_save(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() || self.save_pending.swap(true, Ordering::AcqRel) {
            return;
        }

        let index = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let delay = self.save_delay;
        debug!(delay_secs = delay.as_secs(), "Expiration index save scheduled");

        self.runtime.spawn(async move {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Pending expiration index save cancelled");
                }

                _ = tokio::time::sleep(delay) => {
                    // Mutations from here on schedule a new pass.
                    index.save_pending.store(false, Ordering::Release);
                    let writer = Arc::clone(&index);
                    match tokio::task::spawn_blocking(move || writer.flush()).await {
                        Ok(Ok(styles)) => debug!(styles, "Expiration index persisted"),
                        Ok(Err(e)) => warn!(error = %e, "Failed to persist expiration index"),
                        Err(e) => warn!(error = %e, "Expiration index save task failed"),
                    }
                }
            }
        });
    }

    /// Returns true while a debounced save is waiting to run.
    pub fn is_save_pending(&self) -> bool {
        self.save_pending.load(Ordering::Acquire)
    }

    /// Persists every loaded style immediately.
    ///
    /// A style that fails to write, or whose name is not a valid style
    /// name, is logged and skipped; the count of styles written is returned. Fails only if the index directory cannot
    /// be created.
    pub fn flush(&self) -> io::Result<usize> {
        std::fs::create_dir_all(self.base_dir.join(SERIALIZED_CACHES_DIR))?;

        let snapshot: Vec<(String, HashMap<String, i64>)> = self
            .styles
            .iter()
            .map(|entry| {
                let map = entry
                    .value()
                    .iter()
                    .map(|e| (e.key().clone(), *e.value()))
                    .collect();
                (entry.key().clone(), map)
            })
            .collect();

        let mut written = 0;
        for (style, map) in snapshot {
            if !is_valid_style_name(&style) {
                warn!(style = %style, "Skipping expiration index of invalid map style name");
                continue;
            }
            let path = index_path(&self.base_dir, &style);
            match save_map(&path, &map) {
                Ok(()) => {
                    debug!(style = %style, entries = map.len(), "Saved expiration index");
                    written += 1;
                }
                Err(e) => {
                    warn!(style = %style, path = %path.display(), error = %e, "Failed to save expiration index");
                }
            }
        }
        Ok(written)
    }

    /// Cancels any pending save and persists immediately.
    pub fn shutdown(&self) -> io::Result<usize> {
        self.shutdown.cancel();
        self.save_pending.store(false, Ordering::Release);
        let written = self.flush()?;
        info!(styles = written, "Expiration index flushed on shutdown");
        Ok(written)
    }
}

fn load_map(path: &Path) -> io::Result<HashMap<String, i64>> {
    let reader = BufReader::new(File::open(path)?);
    bincode::deserialize_from(reader).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to deserialize expiration index: {}", e),
        )
    })
}

fn save_map(path: &Path, map: &HashMap<String, i64>) -> io::Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(format!(".{}.tmp", TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)));
    let temp_path = path.with_file_name(temp_name);

    let written = File::create(&temp_path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, map).map_err(|e| {
            io::Error::other(format!("Failed to serialize expiration index: {}", e))
        })?;
        writer.flush()
    });
    let result = written.and_then(|()| std::fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}
