//! Shared configuration, error types, cryptography and small boundary
//! traits used across the `tootik` workspace.

pub mod avatar;
pub mod config;
pub mod crypto;
pub mod error;
pub mod format;
pub mod http_signature;
pub mod id;
pub mod metrics;
pub mod storage;

pub use avatar::{AvatarProcessor, ImageAvatarProcessor, AVATAR_SIDE};
pub use config::Config;
pub use crypto::{fingerprint_der, generate_keypair, generate_rsa_keypair, KeyAlgorithm, Keypair, RsaKeypair};
pub use error::{AppError, AppResult};
pub use format::{strip_html_basic, BasicTextFormatter, TextFormatter};
pub use http_signature::{build_signature_string, calculate_digest, HttpSignature};
pub use id::IdGenerator;
pub use metrics::{get_metrics, Metrics, MetricsSnapshot};
pub use storage::{avatar_storage_key, LocalStorage, StorageConfig, StoredFile};
