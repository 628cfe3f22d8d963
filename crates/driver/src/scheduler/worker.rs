use super::types::Job;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Progresses games from `jobs` until cancelled, sending every finished job to `results`.
pub(crate) async fn progress_games(
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<Job>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut jobs = jobs.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                job = jobs.recv() => job,
            }
        };
        let Some(mut job) = next else {
            return;
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            status = job.player.progress_game() => job.status = status,
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            sent = results.send(job) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
