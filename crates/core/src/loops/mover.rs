//! Mover loop (spec §5): a safety net re-run of the follower rewrite `Move`
//! performs inline, for the case where a follower edge was created (or a
//! previous rewrite pass crashed) between the `Move` activity committing
//! and every follower being re-pointed. `rewrite_target` is idempotent — a
//! follower already pointing at the new identity is simply matched by
//! nothing — so running this repeatedly is always safe.

use sea_orm::DatabaseConnection;
use tootik_common::AppResult;
use tootik_db::repositories::{ActorRepository, FollowRepository};

/// Re-run the follower rewrite for every local actor that has moved.
/// Returns the number of follower edges rewritten this pass.
pub async fn run_once(db: &DatabaseConnection) -> AppResult<u64> {
    let moved = ActorRepository.find_moved_locals(db).await?;
    let mut rewritten = 0;
    for actor in moved {
        let Some(new_target) = actor.moved_to.as_deref() else { continue };
        rewritten += FollowRepository.rewrite_target(db, &actor.id, new_target).await?;
    }
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tootik_db::test_utils::in_memory_db;

    #[tokio::test]
    async fn runs_without_error_on_empty_store() {
        let db = in_memory_db().await.unwrap();
        let rewritten = run_once(&db).await.unwrap();
        assert_eq!(rewritten, 0);
    }
}
