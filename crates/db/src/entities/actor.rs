//! Actor entity: local accounts and cached remote actors (spec §3, §4.2).

use sea_orm::entity::prelude::*;

/// An `ActivityPub` actor, local or a cached remote copy.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "actor")]
pub struct Model {
    /// The actor's canonical id (its `ActivityPub` IRI).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// `true` for actors hosted on this instance.
    pub local: bool,
    /// Preferred username, unique among local actors.
    pub preferred_username: String,
    /// Domain the actor belongs to (this instance's domain for local actors).
    pub domain: String,
    /// `Person`/`Group`/`Service`/... actor type.
    pub actor_type: String,
    /// Display name.
    #[sea_orm(column_type = "Text", nullable)]
    pub display_name: Option<String>,
    /// Profile summary.
    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,
    /// Avatar URL (local: our own storage URL; remote: the actor's icon URL).
    #[sea_orm(nullable)]
    pub avatar_url: Option<String>,
    /// Inbox URL.
    pub inbox_url: String,
    /// Shared inbox URL, when advertised.
    #[sea_orm(nullable)]
    pub shared_inbox_url: Option<String>,
    /// Outbox URL.
    #[sea_orm(nullable)]
    pub outbox_url: Option<String>,
    /// Followers collection URL.
    #[sea_orm(nullable)]
    pub followers_url: Option<String>,
    /// PEM-encoded public key.
    #[sea_orm(column_type = "Text")]
    pub public_key_pem: String,
    /// PEM-encoded private key. Only set for local actors.
    #[sea_orm(column_type = "Text", nullable)]
    pub private_key_pem: Option<String>,
    /// `rsa` or `ed25519` — which algorithm `public_key_pem`/`private_key_pem` use.
    pub key_algorithm: String,
    /// Destination of a completed Move, if any (spec §4.1 Move).
    #[sea_orm(nullable)]
    pub moved_to: Option<String>,
    /// JSON array of actor ids this actor has declared as previous identities.
    #[sea_orm(column_type = "Text", nullable)]
    pub also_known_as: Option<String>,
    /// `true` once the actor has returned 410/404 and is considered gone
    /// (spec §4.2 failure taxonomy).
    pub gone: bool,
    /// Client certificate fingerprint this local actor auto-bound to on
    /// first registration, retained for re-approval flows.
    #[sea_orm(nullable)]
    pub first_cert_fingerprint: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Last time this (remote) actor's document was refetched.
    #[sea_orm(nullable)]
    pub last_refreshed_at: Option<DateTimeUtc>,
    /// Conditional-update throttle columns (spec §4.5 "per-actor throttles
    /// via conditional SQL updates, not in-process locks").
    #[sea_orm(nullable)]
    pub last_post_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_edit_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_boost_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_bookmark_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_follow_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_alias_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_move_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_name_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_avatar_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::object::Entity")]
    Object,
    #[sea_orm(has_many = "super::certificate::Entity")]
    Certificate,
}

impl Related<super::object::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Object.def()
    }
}

impl Related<super::certificate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Certificate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
