//! Certificate-to-account binding and first-contact registration
//! (spec §4.5 steps 1-2, §3 "Client certificate binding").

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tootik_common::crypto::{fingerprint_der, generate_keypair, KeyAlgorithm};
use tootik_common::{AppError, AppResult};
use tootik_db::entities::actor;
use tootik_db::repositories::{ActorRepository, CertificateRepository, InvitationRepository, RegistrationRepository};

use crate::HandlerState;

/// The outcome of looking a presented (or absent) certificate up against
/// the binding table.
#[derive(Debug, Clone)]
pub enum Identity {
    /// No certificate was presented this connection.
    Anonymous,
    /// A certificate was presented whose fingerprint has no binding yet.
    Unbound { fingerprint: String, suggested_name: Option<String> },
    /// Bound to a local actor, but that binding is not yet approved
    /// (spec §4.5 step 2, a second+ certificate pending approval).
    Pending { fingerprint: String },
    /// Bound and approved.
    Bound { fingerprint: String, actor: actor::Model },
}

impl Identity {
    /// The authenticated actor, if any.
    #[must_use]
    pub fn actor(&self) -> Option<&actor::Model> {
        match self {
            Self::Bound { actor, .. } => Some(actor),
            _ => None,
        }
    }
}

/// SHA-256 fingerprint of the peer certificate's DER bytes, and the
/// certificate's subject common name (a registration-name suggestion),
/// extracted from the raw certificate handed up by the TLS layer.
#[must_use]
pub fn fingerprint_and_cn(der: &[u8]) -> (String, Option<String>) {
    let fingerprint = fingerprint_der(der);
    let cn = x509_parser::parse_x509_certificate(der)
        .ok()
        .and_then(|(_, cert)| cert.subject().iter_common_name().next().and_then(|a| a.as_str().ok().map(str::to_string)));
    (fingerprint, cn)
}

/// Look a presented certificate's fingerprint up against the binding table
/// (spec §4.5 step 2, first half: resolve identity before dispatch).
pub async fn authenticate(db: &DatabaseConnection, cert_der: Option<&[u8]>) -> AppResult<Identity> {
    let Some(der) = cert_der else {
        return Ok(Identity::Anonymous);
    };
    let (fingerprint, suggested_name) = fingerprint_and_cn(der);

    let Some(cert) = CertificateRepository.find_by_fingerprint(db, &fingerprint).await? else {
        return Ok(Identity::Unbound { fingerprint, suggested_name });
    };
    if !cert.approved {
        return Ok(Identity::Pending { fingerprint });
    }
    let actor = ActorRepository
        .find_by_id(db, &cert.actor_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("certificate bound to missing actor {}", cert.actor_id)))?;
    Ok(Identity::Bound { fingerprint, actor })
}

/// Register a new local actor and auto-approve its first certificate
/// binding (spec §4.5 step 2, second half).
///
/// # Errors
/// - [`AppError::Forbidden`] if `username` matches the forbidden-name
///   regex, or if registration requires an invitation and none/an invalid
///   one was supplied.
/// - [`AppError::AlreadyExists`] if the username is taken.
/// - [`AppError::Throttled`] if this certificate has exceeded
///   `max_registrations_per_cert_per_hour` or the per-certificate interval.
pub async fn register(
    state: &HandlerState,
    fingerprint: &str,
    username: &str,
    invitation_code: Option<&str>,
) -> AppResult<actor::Model> {
    if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::BadInput("username must be alphanumeric (with `_`/`-`)".to_string()));
    }
    let forbidden = &state.config.federation.forbidden_user_name_regex;
    if !forbidden.is_empty() {
        let re = regex::Regex::new(forbidden).map_err(|e| AppError::Internal(format!("invalid forbidden_user_name_regex: {e}")))?;
        if re.is_match(username) {
            return Err(AppError::Forbidden("Forbidden user name".to_string()));
        }
    }

    if state.config.federation.require_invitation {
        let code = invitation_code.ok_or_else(|| AppError::Forbidden("registration requires an invitation".to_string()))?;
        let invitation = InvitationRepository
            .find(&state.db, code)
            .await?
            .ok_or_else(|| AppError::Forbidden("registration requires an invitation".to_string()))?;
        if invitation.is_used() {
            return Err(AppError::Forbidden("invitation already used".to_string()));
        }
    }

    let now = Utc::now();
    let count = RegistrationRepository.count_since(&state.db, fingerprint, now - chrono::Duration::hours(1)).await?;
    if count >= u64::from(state.config.federation.max_registrations_per_cert_per_hour) {
        return Err(AppError::Throttled);
    }

    if ActorRepository
        .find_local_by_username(&state.db, state.engine.domain(), username)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadyExists(format!("username {username}")));
    }

    let keypair = generate_keypair(KeyAlgorithm::Ed25519)?;
    let actor_id = state.engine.actor_id(username);
    let am = actor::ActiveModel {
        id: sea_orm::Set(actor_id.clone()),
        local: sea_orm::Set(true),
        preferred_username: sea_orm::Set(username.to_string()),
        domain: sea_orm::Set(state.engine.domain().to_string()),
        actor_type: sea_orm::Set("Person".to_string()),
        inbox_url: sea_orm::Set(format!("https://{}/inbox/{username}", state.engine.domain())),
        shared_inbox_url: sea_orm::Set(Some(format!("https://{}/inbox", state.engine.domain()))),
        outbox_url: sea_orm::Set(Some(format!("https://{}/outbox/{username}", state.engine.domain()))),
        followers_url: sea_orm::Set(Some(state.engine.followers_url(&actor_id))),
        public_key_pem: sea_orm::Set(keypair.public_key_pem),
        private_key_pem: sea_orm::Set(Some(keypair.private_key_pem)),
        key_algorithm: sea_orm::Set("ed25519".to_string()),
        gone: sea_orm::Set(false),
        first_cert_fingerprint: sea_orm::Set(Some(fingerprint.to_string())),
        created_at: sea_orm::Set(now),
        updated_at: sea_orm::Set(now),
        ..Default::default()
    };
    let actor = ActorRepository.insert(&state.db, am).await?;
    CertificateRepository.insert(&state.db, fingerprint, &actor.id, true).await?;
    RegistrationRepository.record(&state.db, fingerprint).await?;
    if let Some(code) = invitation_code {
        InvitationRepository.redeem(&state.db, code, &actor.id).await?;
    }
    tootik_common::get_metrics().registrations_completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    Ok(actor)
}

/// Approve a second-or-later certificate binding for `actor_id`
/// (spec §4.5 `/users/certificates/approve/<fp>`): only an already-approved
/// binding of the same actor may approve another.
pub async fn approve_certificate(db: &DatabaseConnection, requester: &actor::Model, fingerprint: &str) -> AppResult<()> {
    let target = CertificateRepository
        .find_by_fingerprint(db, fingerprint)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("certificate {fingerprint}")))?;
    if target.actor_id != requester.id {
        return Err(AppError::Forbidden("certificate belongs to a different actor".to_string()));
    }
    CertificateRepository.approve(db, fingerprint).await?;
    Ok(())
}

/// Revoke a certificate binding for `actor_id`
/// (spec §4.5 `/users/certificates/revoke/<fp>`).
pub async fn revoke_certificate(db: &DatabaseConnection, requester: &actor::Model, fingerprint: &str) -> AppResult<()> {
    let target = CertificateRepository
        .find_by_fingerprint(db, fingerprint)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("certificate {fingerprint}")))?;
    if target.actor_id != requester.id {
        return Err(AppError::Forbidden("certificate belongs to a different actor".to_string()));
    }
    CertificateRepository.revoke(db, fingerprint).await?;
    Ok(())
}

