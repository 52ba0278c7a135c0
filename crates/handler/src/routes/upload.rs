//! Titan avatar upload: `/users/upload/avatar;mime=<t>;size=<n>` (spec §4.5).

use chrono::Utc;
use tootik_common::avatar::AvatarProcessor;
use tootik_common::storage::avatar_storage_key;
use tootik_common::{AppError, AppResult};
use tootik_db::entities::actor;
use tootik_db::repositories::{ActorRepository, ThrottleKind};

use crate::request::TitanParams;
use crate::response::Response;
use crate::HandlerState;

const ALLOWED_MIME: [&str; 3] = ["image/gif", "image/png", "image/jpeg"];

pub async fn avatar(state: &HandlerState, actor_model: &actor::Model, titan: &TitanParams, body: &[u8]) -> Response {
    match avatar_inner(state, actor_model, titan, body).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(&actor_model.id))),
        Err(err) => err.into(),
    }
}

async fn avatar_inner(state: &HandlerState, actor_model: &actor::Model, titan: &TitanParams, body: &[u8]) -> AppResult<()> {
    if !ALLOWED_MIME.contains(&titan.mime.as_str()) {
        return Err(AppError::BadInput(format!("unsupported avatar mime type: {}", titan.mime)));
    }
    if titan.size != body.len() as u64 {
        return Err(AppError::BadInput("declared size does not match uploaded body".to_string()));
    }
    if body.len() as u64 > state.config.limits.max_avatar_size {
        return Err(AppError::BadInput("avatar exceeds max_avatar_size".to_string()));
    }

    let claimed = ActorRepository
        .try_claim_throttle(&state.db, &actor_model.id, ThrottleKind::Avatar, state.config.limits.avatar_throttle_interval, Utc::now())
        .await?;
    if !claimed {
        return Err(AppError::Throttled);
    }

    let normalized = state.avatar.normalize(body)?;
    let key = avatar_storage_key(&actor_model.preferred_username, "png");
    let stored = state.storage.put(&key, &normalized, "image/png").await?;
    ActorRepository.update_profile(&state.db, &actor_model.id, None, None, Some(stored.url)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;

    use crate::test_support::{seed_local_actor, test_config, test_state, test_state_with_config};
    use super::*;

    #[tokio::test]
    async fn unsupported_mime_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let titan = TitanParams { mime: "image/svg+xml".to_string(), size: 3 };
        let resp = avatar(&state, &alice, &titan, b"abc").await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }

    #[tokio::test]
    async fn declared_size_mismatch_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let titan = TitanParams { mime: "image/png".to_string(), size: 10 };
        let resp = avatar(&state, &alice, &titan, b"too short").await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let mut config = test_config();
        std::sync::Arc::get_mut(&mut config).unwrap().limits.max_avatar_size = 4;
        let state = test_state_with_config(db, config);

        let body = vec![0_u8; 8];
        let titan = TitanParams { mime: "image/png".to_string(), size: body.len() as u64 };
        let resp = avatar(&state, &alice, &titan, &body).await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }

    #[tokio::test]
    async fn second_upload_within_the_throttle_window_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let mut config = test_config();
        std::sync::Arc::get_mut(&mut config).unwrap().limits.avatar_throttle_interval = std::time::Duration::from_secs(3600);
        let state = test_state_with_config(db.clone(), config);

        let claimed = ActorRepository
            .try_claim_throttle(&db, &alice.id, ThrottleKind::Avatar, state.config.limits.avatar_throttle_interval, Utc::now())
            .await
            .unwrap();
        assert!(claimed);

        let titan = TitanParams { mime: "image/png".to_string(), size: 3 };
        let resp = avatar(&state, &alice, &titan, b"abc").await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }
}
