//! Line-protocol response formatting (spec §6): `<two-digit status> <meta>\r\n[body]`.

use tootik_common::AppError;

/// A fully-formed response, one of the status families spec §6 names.
#[derive(Debug, Clone)]
pub enum Response {
    /// `10 <prompt>` — more input requested.
    Input(String),
    /// `20 text/gemini` followed by a gemtext body.
    Success(String),
    /// `30 <url>` — redirect.
    Redirect(String),
    /// `40 <message>` — temporary failure.
    TempFailure(String),
    /// `60 <message>` — client certificate required.
    CertRequired(String),
    /// `61 <message>` — peer certificate rejected/pending.
    CertRejected(String),
}

impl Response {
    /// Serialize to the exact bytes written back to the client.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Input(prompt) => format!("10 {prompt}\r\n").into_bytes(),
            Self::Success(body) => {
                let mut out = b"20 text/gemini\r\n".to_vec();
                out.extend_from_slice(body.as_bytes());
                out
            }
            Self::Redirect(url) => format!("30 {url}\r\n").into_bytes(),
            Self::TempFailure(message) => format!("40 {message}\r\n").into_bytes(),
            Self::CertRequired(message) => format!("60 {message}\r\n").into_bytes(),
            Self::CertRejected(message) => format!("61 {message}\r\n").into_bytes(),
        }
    }
}

/// Map an engine/repository error onto the single response line it owes the
/// client (spec §7: "no internal detail leaks").
impl From<AppError> for Response {
    fn from(err: AppError) -> Self {
        match err.status_code() {
            60 => Self::CertRequired(client_message(&err)),
            61 => Self::CertRejected(client_message(&err)),
            40 => Self::TempFailure(client_message(&err)),
            _ => {
                tracing::error!(error = %err, "internal error surfaced to line-protocol client");
                Self::TempFailure("internal error".to_string())
            }
        }
    }
}

/// The human-readable text a client-facing error maps to. Internal variants
/// never reach here (caught by the `_ =>` arm above) so their detail can't
/// leak (spec §7).
fn client_message(err: &AppError) -> String {
    match err {
        AppError::BadInput(msg) => format!("Bad input: {msg}"),
        AppError::NotAuthor => "Error".to_string(),
        AppError::NotFound(what) => format!("Not found: {what}"),
        AppError::AlreadyExists(what) => format!("Already exists: {what}"),
        AppError::AlreadyFollowing => "Already following".to_string(),
        AppError::AlreadyRegistered => "Already registered".to_string(),
        AppError::AlreadyMoved => "Already moved".to_string(),
        AppError::Throttled => "Please try again later".to_string(),
        AppError::Forbidden(msg) => msg.clone(),
        AppError::CertRequired => "A client certificate is required".to_string(),
        AppError::CertPending => "Client certificate is awaiting approval".to_string(),
        _ => "internal error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_maps_to_40() {
        let resp: Response = AppError::Throttled.into();
        let bytes = resp.into_bytes();
        assert!(bytes.starts_with(b"40 Please try again later"));
    }

    #[test]
    fn cert_pending_maps_to_61() {
        let resp: Response = AppError::CertPending.into();
        let bytes = resp.into_bytes();
        assert!(bytes.starts_with(b"61 "));
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let resp: Response = AppError::Database("connection pool exhausted".to_string()).into();
        let bytes = resp.into_bytes();
        assert_eq!(bytes, b"40 internal error\r\n");
    }
}
