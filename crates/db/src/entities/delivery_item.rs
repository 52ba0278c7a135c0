//! Outbound delivery queue item (spec §3, §4.3). Written on enqueue, removed
//! on success or terminal failure (save for the forensic GC window, §B).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "delivery_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The activity being delivered.
    #[sea_orm(indexed)]
    pub activity_id: String,
    /// Actor id the activity is delivered on behalf of (used for per-pair
    /// FIFO ordering alongside `target_inbox`).
    pub sender_actor_id: String,
    /// Destination inbox (may be a shared inbox when batched).
    #[sea_orm(indexed)]
    pub target_inbox: String,
    pub attempts: i32,
    /// Earliest time this item should next be attempted.
    #[sea_orm(indexed)]
    pub next_attempt_at: DateTimeUtc,
    /// `true` once attempts are exhausted or a terminal HTTP failure was hit.
    pub terminal: bool,
    /// Why the item went terminal, for the forensic retention window.
    #[sea_orm(column_type = "Text", nullable)]
    pub terminal_reason: Option<String>,
    pub created_at: DateTimeUtc,
    /// Timestamp the per-(sender, target) FIFO order is preserved by
    /// (insertion order), ties broken by `id`.
    pub sequence: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
