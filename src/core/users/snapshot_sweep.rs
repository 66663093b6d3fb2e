// Periodic catch-all sweep. Presence and status changes don't always arrive
// as discrete events, so every interval we re-observe every member we can see
// and let the store diff them.

use super::user_models::ObservedMember;
use super::user_state_store::{SweepReport, UserRecordStore, UserStateStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Anything that can list the members currently visible to the bot.
#[async_trait]
pub trait MemberSource: Send + Sync {
    async fn observe_members(&self) -> Vec<ObservedMember>;
}

pub async fn run_sweep<S: UserRecordStore>(
    users: &UserStateStore<S>,
    source: &dyn MemberSource,
) -> SweepReport {
    let members = source.observe_members().await;
    let report = users.snapshot_all(members).await;
    tracing::info!(
        observed = report.observed,
        changed = report.changed,
        failed = report.failed,
        "User snapshot sweep completed"
    );
    report
}

/// Spawn the sweep loop. The first sweep runs one full `period` after start;
/// the loop exits as soon as `shutdown` flips to `true`.
pub fn spawn_snapshot_sweep<S, M>(
    users: Arc<UserStateStore<S>>,
    source: M,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: UserRecordStore + 'static,
    M: MemberSource + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    run_sweep(users.as_ref(), &source).await;
                }
                changed = shutdown.changed() => {
                    // Sender gone counts as shutdown too.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("User snapshot sweep stopped");
    })
}
