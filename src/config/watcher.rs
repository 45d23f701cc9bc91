//! Hot reload of the configuration file.
//!
//! ```text
//! notify callback (watcher thread)
//!     → event names the config file? → signal
//! reload task (tokio)
//!     → wait out the burst → load_config → GatewayConfig to the server
//! ```
//!
//! Editors often save by renaming a temp file over the original, which
//! replaces the inode. The parent directory is watched instead and events
//! are matched on file name. A rejected file never reaches the server.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Quiet period after the last change before the file is read.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches one configuration file and sends each valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end the server reloads from.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (updates, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                debounce: DEFAULT_DEBOUNCE,
                updates,
            },
            update_rx,
        )
    }

    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// Dropping the returned watcher stops reloads and ends the reload task.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                notify::Error::generic(&format!("{} does not name a file", self.path.display()))
            })?;
        let dir = watched_dir(&self.path);

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &file_name) => {
                    let _ = signal_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(reload_loop(
            self.path.clone(),
            self.debounce,
            signal_rx,
            self.updates,
        ));

        tracing::info!(
            path = %self.path.display(),
            debounce_ms = self.debounce.as_millis() as u64,
            "Config watcher started"
        );
        Ok(watcher)
    }
}

fn watched_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `event` changed the file called `file_name`.
fn touches(event: &Event, file_name: &OsStr) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}

async fn reload_loop(
    path: PathBuf,
    debounce: Duration,
    mut signals: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<GatewayConfig>,
) {
    while signals.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while signals.try_recv().is_ok() {}

        match load_config(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Config file changed");
                if updates.send(config).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Rejected config change, keeping current configuration"
            ),
        }
    }
}
