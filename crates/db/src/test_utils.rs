//! Test helpers: an in-memory `SQLite` store with migrations applied, for
//! integration tests that exercise real queries (spec §A.5). Unit tests
//! that only need to assert on the SQL shape use
//! `sea_orm::DatabaseBackend::MockDatabase` directly instead.

use sea_orm::{Database, DatabaseConnection};
use tootik_common::AppError;

/// Open a fresh in-memory `SQLite` database with every migration applied.
pub async fn in_memory_db() -> Result<DatabaseConnection, AppError> {
    let db = Database::connect("sqlite::memory:")
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    crate::migrate(&db).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::actor;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    #[tokio::test]
    async fn migrations_create_actor_table() {
        let db = in_memory_db().await.unwrap();
        let now = Utc::now();
        let am = actor::ActiveModel {
            id: Set("https://example.test/user/alice".to_string()),
            local: Set(true),
            preferred_username: Set("alice".to_string()),
            domain: Set("example.test".to_string()),
            actor_type: Set("Person".to_string()),
            inbox_url: Set("https://example.test/inbox/alice".to_string()),
            public_key_pem: Set("---PEM---".to_string()),
            key_algorithm: Set("rsa".to_string()),
            gone: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        am.insert(&db).await.unwrap();

        let found = actor::Entity::find_by_id("https://example.test/user/alice")
            .one(&db)
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
