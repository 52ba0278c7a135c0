//! Garbage collector loop (spec §9 Open Question, resolved in §B): purges
//! terminal delivery and inbox queue rows past the forensic retention
//! window so the tables do not grow without bound.

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tootik_common::AppResult;
use tootik_db::repositories::{DeliveryRepository, InboxRepository};

/// Delete terminal queue rows created before `older_than`.
pub async fn run_once(db: &DatabaseConnection, older_than: DateTime<Utc>) -> AppResult<u64> {
    let deliveries = DeliveryRepository.gc_terminal(db, older_than).await?;
    let inbox = InboxRepository.gc_terminal(db, older_than).await?;
    Ok(deliveries + inbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tootik_db::test_utils::in_memory_db;

    #[tokio::test]
    async fn runs_without_error_on_empty_store() {
        let db = in_memory_db().await.unwrap();
        let purged = run_once(&db, Utc::now()).await.unwrap();
        assert_eq!(purged, 0);
    }
}
