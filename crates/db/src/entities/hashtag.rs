//! Hashtag index (spec §4.5 `/users/hashtag/<tag>`): query is
//! case-insensitive, display preserves original casing (scenario 5).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "hashtag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(indexed)]
    pub object_id: String,
    /// Lower-cased tag, indexed for case-insensitive lookup.
    #[sea_orm(indexed)]
    pub tag_lower: String,
    /// Original casing, as it appeared in the post.
    pub tag_display: String,
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
