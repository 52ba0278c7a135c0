//! Activity entity (spec §3): the `ActivityPub` envelope table. Doubles as
//! the conceptual schema's "outbox" (`local = true` rows) and as the
//! idempotency ledger every `Apply` call consults before touching state,
//! since `id` is globally unique and duplicates must be no-ops.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activity")]
pub struct Model {
    /// The activity's canonical id (`ActivityPub` IRI).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// `true` when authored on this instance (an outbox row).
    pub local: bool,
    /// `Create`/`Update`/`Delete`/`Follow`/`Accept`/... tag.
    pub activity_type: String,
    /// Actor id that authored/signed this activity.
    #[sea_orm(indexed)]
    pub actor_id: String,
    /// Object id this activity acts on, when the object is referenced by
    /// id rather than inlined.
    #[sea_orm(nullable, indexed)]
    pub object_id: Option<String>,
    /// Target id (used by Move, Add, Remove).
    #[sea_orm(nullable)]
    pub target_id: Option<String>,
    /// JSON array of `to` addressees.
    #[sea_orm(column_type = "Text")]
    pub to: String,
    /// JSON array of `cc` addressees.
    #[sea_orm(column_type = "Text")]
    pub cc: String,
    /// The exact raw bytes of the activity as received/sent on the wire.
    /// Needed verbatim so replies can be forwarded without re-signing
    /// (spec §4.4, §9).
    #[sea_orm(column_type = "Blob")]
    pub raw_body: Vec<u8>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::ActorId",
        to = "super::actor::Column::Id"
    )]
    Actor,
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
