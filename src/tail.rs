//! Polls the gateway log and feeds new lines to the state actor.

use mission_deck_core::LogTailer;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::TailConfig;
use crate::state::StateHandle;

/// Start polling. The task ends once the state actor has stopped.
///
/// Each poll touches the filesystem, so it runs on the blocking pool with the
/// tailer moved in and handed back.
pub fn spawn_tailer(config: TailConfig, state: StateHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tailer = LogTailer::new(config.dir.clone(), config.prefix.clone());
        let mut interval = tokio::time::interval(config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(dir = %config.dir.display(), prefix = %config.prefix, "tailing gateway log");

        loop {
            interval.tick().await;
            let polled = tokio::task::spawn_blocking(move || {
                let lines = tailer.poll();
                (tailer, lines)
            })
            .await;
            let lines = match polled {
                Ok((returned, lines)) => {
                    tailer = returned;
                    lines
                }
                Err(err) => {
                    tracing::error!("log poll task failed: {}", err);
                    return;
                }
            };

            match lines {
                Ok(lines) => {
                    for line in lines {
                        if !state.ingest_line(line) {
                            tracing::debug!("state actor gone, tailer stopping");
                            return;
                        }
                    }
                }
                Err(err) => tracing::warn!("log poll failed: {}", err),
            }
        }
    })
}
