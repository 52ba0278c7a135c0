//! Object entity: `Note`/`Question` objects the Activity Engine produces or
//! ingests (spec §3, §4.1). Visibility is derived from `to`/`cc` at read
//! time, never stored (spec §9 design note).

use sea_orm::entity::prelude::*;

/// A `Note` or `Question` object.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "object")]
pub struct Model {
    /// The object's canonical id (`ActivityPub` IRI).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// `true` for objects authored on this instance.
    pub local: bool,
    /// Actor id this object is attributed to.
    #[sea_orm(indexed)]
    pub attributed_to: String,
    /// Id of the object this is a reply to, if any.
    #[sea_orm(nullable, indexed)]
    pub in_reply_to: Option<String>,
    /// Plain-text content, already passed through the `TextFormatter`
    /// boundary (spec §9, §B).
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// JSON array of `to` addressees, as received/constructed.
    #[sea_orm(column_type = "Text")]
    pub to: String,
    /// JSON array of `cc` addressees.
    #[sea_orm(column_type = "Text")]
    pub cc: String,
    /// JSON array of `audience` addressees (Group actor, when present).
    #[sea_orm(column_type = "Text", nullable)]
    pub audience: Option<String>,
    /// JSON array of blind-copy addressees, never rendered or forwarded.
    #[sea_orm(column_type = "Text", nullable)]
    pub bto: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub bcc: Option<String>,
    /// JSON array of `tag` entries (`Mention`/`Hashtag`/`Emoji`, each with
    /// an `href`).
    #[sea_orm(column_type = "Text", nullable)]
    pub tag: Option<String>,
    /// JSON array of `attachment` entries.
    #[sea_orm(column_type = "Text", nullable)]
    pub attachment: Option<String>,
    /// `true` when the object is a poll (`Question`).
    pub is_poll: bool,
    /// Poll closing time, when `is_poll` is set.
    #[sea_orm(nullable)]
    pub poll_closes_at: Option<DateTimeUtc>,
    /// `true` when the poll allows selecting more than one option.
    pub poll_multiple: bool,
    /// The exact raw bytes of the activity that introduced this object, as
    /// received on the wire. Needed to forward replies unsigned (spec §4.4).
    #[sea_orm(column_type = "Blob", nullable)]
    pub raw_activity: Option<Vec<u8>>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Set when the object has been tombstoned by a `Delete`.
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::AttributedTo",
        to = "super::actor::Column::Id"
    )]
    Actor,
    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOption,
    #[sea_orm(has_many = "super::bookmark::Entity")]
    Bookmark,
    #[sea_orm(has_many = "super::share::Entity")]
    Share,
    #[sea_orm(has_many = "super::like::Entity")]
    Like,
    #[sea_orm(has_many = "super::hashtag::Entity")]
    Hashtag,
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actor.def()
    }
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl Related<super::bookmark::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookmark.def()
    }
}

impl Related<super::share::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Share.def()
    }
}

impl Related<super::like::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Like.def()
    }
}

impl Related<super::hashtag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hashtag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
