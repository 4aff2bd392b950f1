use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Anything that can report "the active entry's files changed".
pub trait ChangeSource {
    /// Returns true once per burst of changes.
    fn check_for_changes(&self) -> bool;
}

/// Watches the source and texture files of one entry.
///
/// Parent directories are watched rather than the files themselves so that
/// editors which save by rename are still noticed.
pub struct HotReloader {
    _watcher: RecommendedWatcher,
    files_modified: Arc<Mutex<bool>>,
    watched: Vec<PathBuf>,
}

impl HotReloader {
    pub fn new<P: AsRef<Path>>(path: P) -> notify::Result<Self> {
        Self::new_multi_file(&[path.as_ref().to_path_buf()])
    }

    pub fn new_multi_file(paths: &[PathBuf]) -> notify::Result<Self> {
        let files_modified = Arc::new(Mutex::new(false));
        let flag = files_modified.clone();

        let watched: Vec<PathBuf> = paths
            .iter()
            .map(|p| p.canonicalize())
            .collect::<Result<_, _>>()?;
        let targets = watched.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else {
                    return;
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                let relevant = event.paths.iter().any(|changed| {
                    let changed = changed.canonicalize().unwrap_or_else(|_| changed.clone());
                    targets.contains(&changed)
                });
                if relevant {
                    if let Ok(mut modified) = flag.lock() {
                        *modified = true;
                    }
                }
            },
            Config::default(),
        )?;

        let directories: BTreeSet<&Path> = watched.iter().filter_map(|p| p.parent()).collect();
        for directory in directories {
            watcher.watch(directory, RecursiveMode::NonRecursive)?;
        }
        log::debug!("Watching {} file(s) for changes", watched.len());

        Ok(Self {
            _watcher: watcher,
            files_modified,
            watched,
        })
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

impl ChangeSource for HotReloader {
    fn check_for_changes(&self) -> bool {
        let Ok(mut modified) = self.files_modified.lock() else {
            return false;
        };
        if *modified {
            *modified = false;
            // Let the writer finish before the sources are re-read.
            thread::sleep(Duration::from_millis(50));
            return true;
        }
        false
    }
}

/// Change source driven by hand, for tests.
#[derive(Default)]
pub struct MockHotReloader {
    files_modified: Arc<Mutex<bool>>,
}

impl MockHotReloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn simulate_file_change(&self) {
        if let Ok(mut modified) = self.files_modified.lock() {
            *modified = true;
        }
    }
}

impl ChangeSource for MockHotReloader {
    fn check_for_changes(&self) -> bool {
        let Ok(mut modified) = self.files_modified.lock() else {
            return false;
        };
        std::mem::take(&mut *modified)
    }
}
