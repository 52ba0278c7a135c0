//! Poll option entity, belonging to an `object` with `is_poll = true`.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "poll_option")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The poll object this option belongs to.
    #[sea_orm(indexed)]
    pub object_id: String,
    /// Zero-based position within the poll.
    pub position: i32,
    /// Option label text.
    #[sea_orm(column_type = "Text")]
    pub name: String,
    /// Cached vote tally, refreshed by the poll tallier loop (spec §5).
    pub votes: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::object::Entity",
        from = "Column::ObjectId",
        to = "super::object::Column::Id"
    )]
    Object,
}

impl Related<super::object::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Object.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
