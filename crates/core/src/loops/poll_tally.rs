//! Poll tally loop (spec §4.1 `Poller`, §5): periodically re-counts
//! distinct voters per option for every open poll and writes the cached
//! tally back onto `poll_option.votes`.

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tootik_common::AppResult;
use tootik_db::repositories::{ObjectRepository, VoteRepository};

/// Run one tally pass over every poll that has not yet closed.
pub async fn run_once(db: &DatabaseConnection) -> AppResult<usize> {
    let polls = ObjectRepository.find_open_polls(db, Utc::now()).await?;
    for poll in &polls {
        VoteRepository.retally(db, &poll.id).await?;
    }
    Ok(polls.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tootik_db::test_utils::in_memory_db;

    #[tokio::test]
    async fn runs_without_error_on_empty_store() {
        let db = in_memory_db().await.unwrap();
        let tallied = run_once(&db).await.unwrap();
        assert_eq!(tallied, 0);
    }
}
