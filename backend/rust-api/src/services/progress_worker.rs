use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{metrics::PROGRESS_WORKER_TICKS_TOTAL, services::challenge_service::ChallengeService};

/// Periodically recomputes participant progress for every active challenge
pub struct ProgressWorker {
    challenges: Arc<ChallengeService>,
    interval: Duration,
}

impl ProgressWorker {
    pub fn new(challenges: Arc<ChallengeService>, interval_secs: u64) -> Self {
        Self {
            challenges,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting challenge progress worker loop (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            match self.run_once().await {
                Ok(updated) => {
                    PROGRESS_WORKER_TICKS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    info!(challenges = updated, "Progress worker tick completed");
                }
                Err(err) => {
                    PROGRESS_WORKER_TICKS_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    warn!(error = %err, "Progress worker tick failed");
                }
            }

            sleep(self.interval).await;
        }
    }

    /// One pass over the active challenges. Returns how many were recomputed.
    pub async fn run_once(&self) -> Result<usize> {
        let reports = self.challenges.recompute_all_active(Utc::now()).await?;

        let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
        if failed > 0 {
            warn!(failed, "Some participants could not be recomputed");
        }
        Ok(reports.len())
    }
}
