//! Invitation code (spec §4.5: registration "optionally gated by an
//! invitation code" when `RequireInvitation` is set).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "invitation")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    #[sea_orm(nullable)]
    pub used_by_actor_id: Option<String>,
    pub created_at: DateTimeUtc,
    #[sea_orm(nullable)]
    pub used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Model {
    /// Whether this invitation has already been redeemed.
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

impl ActiveModelBehavior for ActiveModel {}
