use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::store::{OtpStore, StoreError};

/// Delete every record that expired before now.
pub async fn sweep_expired_codes(store: &dyn OtpStore) -> Result<u64, StoreError> {
    let deleted = store.delete_expired(Utc::now()).await?;
    if deleted > 0 {
        metrics::counter!("otp_records_swept_total").increment(deleted);
        tracing::info!(deleted, "Swept expired verification codes");
    }
    Ok(deleted)
}

/// Run [`sweep_expired_codes`] on a fixed period until `shutdown` fires.
pub fn spawn_expired_code_sweeper(
    store: Arc<dyn OtpStore>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Expired code sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = sweep_expired_codes(store.as_ref()).await {
                        tracing::error!(error = %e, "Expired code sweep failed");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewOtpRecord, OtpPurpose};
    use crate::services::memory::MemoryStore;
    use chrono::Duration as ChronoDuration;

    async fn seed(store: &MemoryStore, age_minutes: i64) -> i64 {
        let created_at = Utc::now() - ChronoDuration::minutes(age_minutes);
        store
            .insert_otp(NewOtpRecord {
                email: "a@x.com".to_string(),
                code_hash: "salt:hash".to_string(),
                purpose: OtpPurpose::SignIn,
                expires_at: created_at + ChronoDuration::minutes(10),
                created_at,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let store = MemoryStore::new();
        seed(&store, 30).await;
        let live = seed(&store, 1).await;

        assert_eq!(sweep_expired_codes(&store).await.unwrap(), 1);
        let remaining = store.records_for("a@x.com");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live);
    }

    #[tokio::test]
    async fn sweeper_runs_and_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 30).await;
        let shutdown = CancellationToken::new();

        let handle = spawn_expired_code_sweeper(
            store.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(store.otp_count(), 0);
    }
}
