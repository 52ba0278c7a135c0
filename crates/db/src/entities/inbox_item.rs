//! Inbound queue item (spec §3, §4.4): raw signed activity bodies captured
//! by the inbox HTTP endpoint before verification and apply.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "inbox_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The exact bytes posted to the inbox, unparsed.
    #[sea_orm(column_type = "Blob")]
    pub raw_body: Vec<u8>,
    /// Request headers needed to re-verify the signature (JSON map),
    /// captured at receipt time.
    #[sea_orm(column_type = "Text")]
    pub headers: String,
    /// `keyId` claimed by the `Signature` header, before verification.
    #[sea_orm(nullable)]
    pub sender_hint: Option<String>,
    /// Local actor this item targeted (`None` for the shared inbox).
    #[sea_orm(nullable)]
    pub target_actor_id: Option<String>,
    pub received_at: DateTimeUtc,
    pub attempts: i32,
    #[sea_orm(indexed)]
    pub next_attempt_at: DateTimeUtc,
    pub terminal: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub terminal_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
