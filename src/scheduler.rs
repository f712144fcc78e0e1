use crate::error::{RoundError, RoundResult};
use crate::state::AppState;
use crate::types::{RoundId, RoundPhase};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

struct ScheduledJob {
    /// Distinguishes a job from the one that replaced it
    generation: u64,
    handle: JoinHandle<()>,
}

/// Running phase-advance jobs, keyed by job id
#[derive(Default)]
pub struct JobTable {
    next_generation: u64,
    jobs: HashMap<String, ScheduledJob>,
}

/// Identifier of the advance job for a round
pub fn job_id(round_id: &str) -> String {
    format!("sched_round_advance_{}", round_id)
}

impl AppState {
    /// Advance a round one phase every `interval` until it is revealed.
    /// Replaces any job already running for the round.
    pub async fn schedule_round_advance(
        &self,
        long_id: &str,
        interval: Duration,
    ) -> RoundResult<String> {
        let secs = interval.as_secs();
        if secs == 0 {
            return Err(RoundError::InvalidInterval(
                "interval must be at least one second".to_string(),
            ));
        }

        let round_id = {
            let mut store = self.store.write().await;
            let round_id = store
                .round_by_long_id(long_id)
                .map(|r| r.id.clone())
                .ok_or(RoundError::RoundNotFound)?;
            let round = store
                .rounds
                .get_mut(&round_id)
                .ok_or(RoundError::RoundNotFound)?;
            if round.phase == RoundPhase::Revealed {
                return Err(RoundError::WrongPhase {
                    expected: RoundPhase::Listen,
                    actual: round.phase,
                });
            }
            round.advance_interval_secs = Some(secs);
            round_id
        };

        let job_id = self.spawn_advance_job(&round_id, long_id, Duration::from_secs(secs));
        tracing::info!("Scheduled {} every {}s", job_id, secs);
        Ok(job_id)
    }

    /// Stop a round's advance job. Returns whether one was running.
    pub async fn cancel_round_advance(&self, long_id: &str) -> RoundResult<bool> {
        let round_id = {
            let mut store = self.store.write().await;
            let round_id = store
                .round_by_long_id(long_id)
                .map(|r| r.id.clone())
                .ok_or(RoundError::RoundNotFound)?;
            if let Some(round) = store.rounds.get_mut(&round_id) {
                round.advance_interval_secs = None;
            }
            round_id
        };

        let removed = self.job_table().jobs.remove(&job_id(&round_id));
        Ok(match removed {
            Some(job) => {
                job.handle.abort();
                tracing::info!("Cancelled {}", job_id(&round_id));
                true
            }
            None => false,
        })
    }

    /// Abort every job without forgetting round intervals, so
    /// `restore_schedules` picks them up again on the next start
    pub fn cancel_all_jobs(&self) {
        let mut table = self.job_table();
        for (id, job) in table.jobs.drain() {
            job.handle.abort();
            tracing::debug!("Stopped {}", id);
        }
    }

    /// Ids of running jobs, sorted
    pub fn active_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.job_table().jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Restart jobs for rounds that still have an interval and are not
    /// revealed. Returns how many were started.
    pub async fn restore_schedules(&self) -> usize {
        let pending: Vec<(RoundId, String, u64)> = self
            .store
            .read()
            .await
            .rounds
            .values()
            .filter(|r| r.phase != RoundPhase::Revealed)
            .filter_map(|r| {
                r.advance_interval_secs
                    .filter(|secs| *secs > 0)
                    .map(|secs| (r.id.clone(), r.long_id.clone(), secs))
            })
            .collect();

        for (round_id, long_id, secs) in &pending {
            let job_id = self.spawn_advance_job(round_id, long_id, Duration::from_secs(*secs));
            tracing::info!("Restored {} every {}s", job_id, secs);
        }
        pending.len()
    }

    fn job_table(&self) -> std::sync::MutexGuard<'_, JobTable> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spawn_advance_job(&self, round_id: &str, long_id: &str, interval: Duration) -> String {
        let id = job_id(round_id);
        let mut table = self.job_table();
        table.next_generation += 1;
        let generation = table.next_generation;

        let state = self.clone();
        let task_id = id.clone();
        let long_id = long_id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match state.scheduled_advance(&long_id).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!("{} failed, retrying next tick: {}", task_id, e);
                    }
                }
            }

            state.finish_job(&task_id, generation).await;
        });

        if let Some(old) = table.jobs.insert(id.clone(), ScheduledJob { generation, handle }) {
            old.handle.abort();
            tracing::debug!("Replaced {}", id);
        }
        id
    }

    /// One fire of an advance job. Returns true once the job is done.
    async fn scheduled_advance(&self, long_id: &str) -> RoundResult<bool> {
        let round = match self.get_round(long_id).await {
            Ok(round) => round,
            Err(RoundError::RoundNotFound) => return Ok(true),
            Err(e) => return Err(e),
        };

        match round.phase {
            RoundPhase::Submit => {
                self.advance(long_id, RoundPhase::Listen).await?;
                Ok(false)
            }
            RoundPhase::Listen => {
                self.advance(long_id, RoundPhase::Revealed).await?;
                Ok(true)
            }
            RoundPhase::Revealed => Ok(true),
        }
    }

    /// Deregister a finished job unless it has already been replaced
    async fn finish_job(&self, id: &str, generation: u64) {
        {
            let mut table = self.job_table();
            if table.jobs.get(id).map(|j| j.generation) != Some(generation) {
                return;
            }
            table.jobs.remove(id);
        }

        let round_id = id.trim_start_matches("sched_round_advance_");
        if let Some(round) = self.store.write().await.rounds.get_mut(round_id) {
            round.advance_interval_secs = None;
        }
        tracing::info!("{} finished", id);
    }
}
