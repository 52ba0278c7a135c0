//! Follow edge entity (spec §3): at most one row per (follower, followed).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "follow_edge")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Actor id doing the following.
    #[sea_orm(indexed)]
    pub follower_id: String,
    /// Actor id being followed.
    #[sea_orm(indexed)]
    pub followed_id: String,
    /// The id of the Follow activity that created this edge, used to match
    /// an incoming Accept/Reject to the right edge.
    pub follow_activity_id: String,
    /// `false` until an Accept arrives for a remote `followed_id`; local
    /// follows are accepted immediately.
    pub accepted: bool,
    pub since: DateTimeUtc,
    /// Last time `follower_id` posted, used to order feed materialization.
    #[sea_orm(nullable)]
    pub last_post_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::FollowerId",
        to = "super::actor::Column::Id"
    )]
    Follower,
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Follower.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
