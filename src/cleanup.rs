use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Background sweep of the managed temp directory. Request-scoped temp files
/// delete themselves; this reclaims anything left behind by a crashed
/// attempt once it is older than the retention window. Runs for the life of
/// the process and stops when the shutdown channel flips.
pub fn spawn_cleanup_task(
    dir: PathBuf,
    interval: Duration,
    retention: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh start does
        // not race files being staged during boot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match sweep(&dir, retention) {
                        Ok(0) => debug!("temp sweep: nothing to reclaim"),
                        Ok(n) => info!("temp sweep: removed {n} stale file(s)"),
                        Err(e) => warn!("temp sweep failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    debug!("temp sweep stopping");
                    break;
                }
            }
        }
    })
}

fn sweep(dir: &PathBuf, retention: Duration) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let age = entry
            .metadata()?
            .modified()?
            .elapsed()
            .unwrap_or(Duration::ZERO);
        if age > retention {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("cannot remove {}: {e}", path.display());
            } else {
                removed += 1;
            }
        }
    }
    Ok(removed)
}
