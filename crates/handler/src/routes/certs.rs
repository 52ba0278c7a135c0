//! Multi-certificate management: `/users/certificates/approve/<fp>`,
//! `/users/certificates/revoke/<fp>` (spec §4.5).

use tootik_db::entities::actor;

use crate::response::Response;
use crate::session;
use crate::HandlerState;

pub async fn approve(state: &HandlerState, requester: &actor::Model, fingerprint: &str) -> Response {
    match session::approve_certificate(&state.db, requester, fingerprint).await {
        Ok(()) => Response::Success("Certificate approved.\r\n".to_string()),
        Err(err) => err.into(),
    }
}

pub async fn revoke(state: &HandlerState, requester: &actor::Model, fingerprint: &str) -> Response {
    match session::revoke_certificate(&state.db, requester, fingerprint).await {
        Ok(()) => Response::Success("Certificate revoked.\r\n".to_string()),
        Err(err) => err.into(),
    }
}
