use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

/// Broadcasts every path under the root that is modified, created or removed
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    sender: broadcast::Sender<PathBuf>,
}

impl FileWatcher {
    pub fn new(root: &Path) -> WatcherResult<Self> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let tx = sender.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => {
                    for path in event.paths {
                        debug!(path = %path.display(), "File changed");
                        // No subscribers is fine
                        let _ = tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Watch error: {}", e),
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok(Self {
            _watcher: watcher,
            sender,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.sender.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<PathBuf> {
        self.sender.clone()
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_watcher() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let watcher = FileWatcher::new(&root).unwrap();
        let mut changes = watcher.subscribe();

        let file = root.join("App.css");
        tokio::spawn({
            let file = file.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                fs::write(file, ".app {}").unwrap();
            }
        });

        let changed = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .expect("change event")
            .unwrap();
        assert_eq!(changed, file);
    }
}
