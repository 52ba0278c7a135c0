//! `ActivityPub` HTTP client (spec §4.2): actor/object resolution, WebFinger,
//! and signed delivery to remote inboxes. Failure taxonomy per spec §4.2:
//! network/5xx is transient and retryable, 410/404 on an actor marks it
//! gone, 401/403 and malformed responses are terminal.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde_json::Value;
use tootik_common::crypto::KeyAlgorithm;
use tootik_common::{AppError, AppResult};
use tracing::{debug, info, warn};

use crate::signature::sign_request;

/// Outcome of a delivery attempt, distinguishing "actor is gone" from other
/// terminal failures since it drives `ActorRepository::mark_gone` in the
/// delivery worker (spec §4.2 failure taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    ActorGone,
}

/// `ActivityPub` HTTP client.
#[derive(Clone)]
pub struct ApClient {
    client: reqwest::Client,
    user_agent: String,
}

impl ApClient {
    /// Build a client identifying itself as `instance_url`.
    #[must_use]
    pub fn new(instance_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, user_agent: format!("tootik/0.1 (+{instance_url})") }
    }

    /// Sign and POST an activity to a remote inbox.
    ///
    /// # Errors
    /// Returns [`AppError::TransientNet`] on network failure or a 5xx
    /// response, [`AppError::TerminalHttp`] on 401/403/malformed responses.
    pub async fn deliver(
        &self,
        inbox_url: &str,
        activity: &Value,
        algorithm: KeyAlgorithm,
        private_key_pem: &str,
        key_id: &str,
    ) -> AppResult<DeliveryOutcome> {
        let body = serde_json::to_vec(activity).map_err(|e| AppError::Internal(format!("failed to encode activity: {e}")))?;
        let activity_type = activity.get("type").and_then(Value::as_str).unwrap_or("Unknown").to_string();
        self.deliver_raw(inbox_url, &body, algorithm, private_key_pem, key_id, &activity_type).await
    }

    /// Sign and POST raw, already-serialized bytes to a remote inbox. Used
    /// both for freshly-built outgoing activities and for forwarding an
    /// inbound reply's exact received bytes to local followers' remote
    /// inboxes without re-encoding them (spec §4.4, §9).
    ///
    /// # Errors
    /// Returns [`AppError::TransientNet`] on network failure or a 5xx
    /// response, [`AppError::TerminalHttp`] on 401/403/malformed responses.
    pub async fn deliver_raw(
        &self,
        inbox_url: &str,
        body: &[u8],
        algorithm: KeyAlgorithm,
        private_key_pem: &str,
        key_id: &str,
        activity_type: &str,
    ) -> AppResult<DeliveryOutcome> {
        let url = Url::parse(inbox_url).map_err(|e| AppError::TerminalHttp(format!("invalid inbox url: {e}")))?;
        let host = url.host_str().ok_or_else(|| AppError::TerminalHttp("inbox url has no host".into()))?;

        let signed = sign_request(algorithm, private_key_pem, key_id, "POST", host, url.path(), body)?;

        debug!(inbox = %inbox_url, activity_type, "delivering activity");

        let mut request = self
            .client
            .post(inbox_url)
            .header("Host", host)
            .header("Date", &signed.date_header)
            .header("Signature", &signed.signature_header)
            .header("User-Agent", &self.user_agent)
            .header("Content-Type", "application/activity+json")
            .header("Accept", "application/activity+json, application/ld+json")
            .body(body.to_vec());
        if let Some(digest) = &signed.digest_header {
            request = request.header("Digest", digest);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() || status == StatusCode::ACCEPTED {
            info!(inbox = %inbox_url, %status, "activity delivered");
            Ok(DeliveryOutcome::Delivered)
        } else if status == StatusCode::GONE || status == StatusCode::NOT_FOUND {
            warn!(inbox = %inbox_url, %status, "remote actor is gone");
            Ok(DeliveryOutcome::ActorGone)
        } else if status.is_server_error() {
            Err(AppError::TransientNet(format!("delivery to {inbox_url} returned {status}")))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::TerminalHttp(format!("delivery to {inbox_url} returned {status}: {body}")))
        }
    }

    /// Fetch a remote actor document by its canonical id URL.
    ///
    /// # Errors
    /// Returns an error on network failure, non-2xx response, or a body
    /// that doesn't parse as JSON.
    pub async fn fetch_actor(&self, actor_url: &str) -> AppResult<Value> {
        self.fetch_json(
            actor_url,
            "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"",
        )
        .await
    }

    /// Fetch a remote object (Note, Question, ...) by its canonical id URL.
    ///
    /// # Errors
    /// Returns an error on network failure, non-2xx response, or a body
    /// that doesn't parse as JSON.
    pub async fn fetch_object(&self, object_url: &str) -> AppResult<Value> {
        self.fetch_json(object_url, "application/activity+json, application/ld+json").await
    }

    async fn fetch_json(&self, url: &str, accept: &str) -> AppResult<Value> {
        debug!(url, "fetching remote resource");
        let response = self.client.get(url).header("User-Agent", &self.user_agent).header("Accept", accept).send().await?;
        let status = response.status();

        if status == StatusCode::GONE || status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(url.to_string()));
        }
        if status.is_server_error() {
            return Err(AppError::TransientNet(format!("{url} returned {status}")));
        }
        if !status.is_success() {
            return Err(AppError::TerminalHttp(format!("{url} returned {status}")));
        }
        response.json().await.map_err(|e| AppError::SchemaInvalid(format!("malformed response from {url}: {e}")))
    }

    /// Resolve `acct:<acct>@<domain>` via `WebFinger` (spec §4.2).
    ///
    /// # Errors
    /// Returns an error on network failure or a non-2xx/malformed response.
    pub async fn webfinger(&self, acct: &str, domain: &str) -> AppResult<Value> {
        let url = format!("https://{domain}/.well-known/webfinger?resource=acct:{acct}");
        debug!(acct, domain, "performing webfinger lookup");

        let response =
            self.client.get(&url).header("User-Agent", &self.user_agent).header("Accept", "application/jrd+json, application/json").send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AppError::NotFound(format!("webfinger for {acct}@{domain}")));
        }
        response.json().await.map_err(|e| AppError::SchemaInvalid(format!("malformed webfinger response: {e}")))
    }
}

impl Default for ApClient {
    fn default() -> Self {
        Self::new("https://localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_identifies_itself_with_instance_url() {
        let client = ApClient::new("https://example.com");
        assert!(client.user_agent.contains("tootik"));
        assert!(client.user_agent.contains("example.com"));
    }
}
