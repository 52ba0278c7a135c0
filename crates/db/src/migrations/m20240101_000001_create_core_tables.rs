//! Creates every table spec §6 lists in the conceptual schema, plus the
//! indexes spec §6 names explicitly: `(author, time)`, `(hashtag)`,
//! `(inReplyTo)`, `(destination, nextAt)`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Actor::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Actor::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Actor::Local).boolean().not_null())
                    .col(ColumnDef::new(Actor::PreferredUsername).string().not_null())
                    .col(ColumnDef::new(Actor::Domain).string().not_null())
                    .col(ColumnDef::new(Actor::ActorType).string().not_null())
                    .col(ColumnDef::new(Actor::DisplayName).text())
                    .col(ColumnDef::new(Actor::Summary).text())
                    .col(ColumnDef::new(Actor::AvatarUrl).string())
                    .col(ColumnDef::new(Actor::InboxUrl).string().not_null())
                    .col(ColumnDef::new(Actor::SharedInboxUrl).string())
                    .col(ColumnDef::new(Actor::OutboxUrl).string())
                    .col(ColumnDef::new(Actor::FollowersUrl).string())
                    .col(ColumnDef::new(Actor::PublicKeyPem).text().not_null())
                    .col(ColumnDef::new(Actor::PrivateKeyPem).text())
                    .col(ColumnDef::new(Actor::KeyAlgorithm).string().not_null())
                    .col(ColumnDef::new(Actor::MovedTo).string())
                    .col(ColumnDef::new(Actor::AlsoKnownAs).text())
                    .col(ColumnDef::new(Actor::Gone).boolean().not_null().default(false))
                    .col(ColumnDef::new(Actor::FirstCertFingerprint).string())
                    .col(ColumnDef::new(Actor::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Actor::UpdatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Actor::LastRefreshedAt).timestamp())
                    .col(ColumnDef::new(Actor::LastPostAt).timestamp())
                    .col(ColumnDef::new(Actor::LastEditAt).timestamp())
                    .col(ColumnDef::new(Actor::LastBoostAt).timestamp())
                    .col(ColumnDef::new(Actor::LastBookmarkAt).timestamp())
                    .col(ColumnDef::new(Actor::LastFollowAt).timestamp())
                    .col(ColumnDef::new(Actor::LastAliasAt).timestamp())
                    .col(ColumnDef::new(Actor::LastMoveAt).timestamp())
                    .col(ColumnDef::new(Actor::LastNameAt).timestamp())
                    .col(ColumnDef::new(Actor::LastAvatarAt).timestamp())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_actor_domain_username")
                    .table(Actor::Table)
                    .col(Actor::Domain)
                    .col(Actor::PreferredUsername)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Object::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Object::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Object::Local).boolean().not_null())
                    .col(ColumnDef::new(Object::AttributedTo).string().not_null())
                    .col(ColumnDef::new(Object::InReplyTo).string())
                    .col(ColumnDef::new(Object::Content).text().not_null())
                    .col(ColumnDef::new(Object::To).text().not_null())
                    .col(ColumnDef::new(Object::Cc).text().not_null())
                    .col(ColumnDef::new(Object::Audience).text())
                    .col(ColumnDef::new(Object::Bto).text())
                    .col(ColumnDef::new(Object::Bcc).text())
                    .col(ColumnDef::new(Object::Tag).text())
                    .col(ColumnDef::new(Object::Attachment).text())
                    .col(ColumnDef::new(Object::IsPoll).boolean().not_null().default(false))
                    .col(ColumnDef::new(Object::PollClosesAt).timestamp())
                    .col(ColumnDef::new(Object::PollMultiple).boolean().not_null().default(false))
                    .col(ColumnDef::new(Object::RawActivity).blob())
                    .col(ColumnDef::new(Object::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Object::UpdatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Object::DeletedAt).timestamp())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_object_author_time")
                    .table(Object::Table)
                    .col(Object::AttributedTo)
                    .col(Object::CreatedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_object_in_reply_to")
                    .table(Object::Table)
                    .col(Object::InReplyTo)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOption::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollOption::ObjectId).string().not_null())
                    .col(ColumnDef::new(PollOption::Position).integer().not_null())
                    .col(ColumnDef::new(PollOption::Name).text().not_null())
                    .col(ColumnDef::new(PollOption::Votes).big_integer().not_null().default(0))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_option_object")
                    .table(PollOption::Table)
                    .col(PollOption::ObjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vote::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vote::ObjectId).string().not_null())
                    .col(ColumnDef::new(Vote::ActorId).string().not_null())
                    .col(ColumnDef::new(Vote::PollOptionId).big_integer().not_null())
                    .col(ColumnDef::new(Vote::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_object_actor")
                    .table(Vote::Table)
                    .col(Vote::ObjectId)
                    .col(Vote::ActorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FollowEdge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowEdge::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FollowEdge::FollowerId).string().not_null())
                    .col(ColumnDef::new(FollowEdge::FollowedId).string().not_null())
                    .col(ColumnDef::new(FollowEdge::FollowActivityId).string().not_null())
                    .col(ColumnDef::new(FollowEdge::Accepted).boolean().not_null().default(false))
                    .col(ColumnDef::new(FollowEdge::Since).timestamp().not_null())
                    .col(ColumnDef::new(FollowEdge::LastPostAt).timestamp())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_pair")
                    .table(FollowEdge::Table)
                    .col(FollowEdge::FollowerId)
                    .col(FollowEdge::FollowedId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_followed")
                    .table(FollowEdge::Table)
                    .col(FollowEdge::FollowedId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Activity::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Activity::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Activity::Local).boolean().not_null())
                    .col(ColumnDef::new(Activity::ActivityType).string().not_null())
                    .col(ColumnDef::new(Activity::ActorId).string().not_null())
                    .col(ColumnDef::new(Activity::ObjectId).string())
                    .col(ColumnDef::new(Activity::TargetId).string())
                    .col(ColumnDef::new(Activity::To).text().not_null())
                    .col(ColumnDef::new(Activity::Cc).text().not_null())
                    .col(ColumnDef::new(Activity::RawBody).blob().not_null())
                    .col(ColumnDef::new(Activity::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_activity_actor")
                    .table(Activity::Table)
                    .col(Activity::ActorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeliveryItem::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeliveryItem::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeliveryItem::ActivityId).string().not_null())
                    .col(ColumnDef::new(DeliveryItem::SenderActorId).string().not_null())
                    .col(ColumnDef::new(DeliveryItem::TargetInbox).string().not_null())
                    .col(ColumnDef::new(DeliveryItem::Attempts).integer().not_null().default(0))
                    .col(ColumnDef::new(DeliveryItem::NextAttemptAt).timestamp().not_null())
                    .col(ColumnDef::new(DeliveryItem::Terminal).boolean().not_null().default(false))
                    .col(ColumnDef::new(DeliveryItem::TerminalReason).text())
                    .col(ColumnDef::new(DeliveryItem::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(DeliveryItem::Sequence).big_integer().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_destination_next")
                    .table(DeliveryItem::Table)
                    .col(DeliveryItem::TargetInbox)
                    .col(DeliveryItem::NextAttemptAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_pair_sequence")
                    .table(DeliveryItem::Table)
                    .col(DeliveryItem::SenderActorId)
                    .col(DeliveryItem::TargetInbox)
                    .col(DeliveryItem::Sequence)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InboxItem::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InboxItem::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InboxItem::RawBody).blob().not_null())
                    .col(ColumnDef::new(InboxItem::Headers).text().not_null())
                    .col(ColumnDef::new(InboxItem::SenderHint).string())
                    .col(ColumnDef::new(InboxItem::TargetActorId).string())
                    .col(ColumnDef::new(InboxItem::ReceivedAt).timestamp().not_null())
                    .col(ColumnDef::new(InboxItem::Attempts).integer().not_null().default(0))
                    .col(ColumnDef::new(InboxItem::NextAttemptAt).timestamp().not_null())
                    .col(ColumnDef::new(InboxItem::Terminal).boolean().not_null().default(false))
                    .col(ColumnDef::new(InboxItem::TerminalReason).text())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_inbox_item_next_attempt")
                    .table(InboxItem::Table)
                    .col(InboxItem::NextAttemptAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Certificate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Certificate::Fingerprint)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Certificate::ActorId).string().not_null())
                    .col(ColumnDef::new(Certificate::Approved).boolean().not_null().default(false))
                    .col(ColumnDef::new(Certificate::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_certificate_actor")
                    .table(Certificate::Table)
                    .col(Certificate::ActorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bookmark::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookmark::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bookmark::ActorId).string().not_null())
                    .col(ColumnDef::new(Bookmark::ObjectId).string().not_null())
                    .col(ColumnDef::new(Bookmark::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_bookmark_actor_object")
                    .table(Bookmark::Table)
                    .col(Bookmark::ActorId)
                    .col(Bookmark::ObjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Share::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Share::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Share::ActorId).string().not_null())
                    .col(ColumnDef::new(Share::ObjectId).string().not_null())
                    .col(ColumnDef::new(Share::AnnounceActivityId).string().not_null())
                    .col(ColumnDef::new(Share::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_share_actor_object")
                    .table(Share::Table)
                    .col(Share::ActorId)
                    .col(Share::ObjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Like::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Like::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Like::ActorId).string().not_null())
                    .col(ColumnDef::new(Like::ObjectId).string().not_null())
                    .col(ColumnDef::new(Like::LikeActivityId).string().not_null())
                    .col(ColumnDef::new(Like::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_like_actor_object")
                    .table(Like::Table)
                    .col(Like::ActorId)
                    .col(Like::ObjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Hashtag::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Hashtag::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Hashtag::ObjectId).string().not_null())
                    .col(ColumnDef::new(Hashtag::TagLower).string().not_null())
                    .col(ColumnDef::new(Hashtag::TagDisplay).string().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_hashtag_tag")
                    .table(Hashtag::Table)
                    .col(Hashtag::TagLower)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invitation::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invitation::Code).string().not_null().primary_key())
                    .col(ColumnDef::new(Invitation::UsedByActorId).string())
                    .col(ColumnDef::new(Invitation::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Invitation::UsedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RegistrationAttempt::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RegistrationAttempt::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RegistrationAttempt::Fingerprint).string().not_null())
                    .col(ColumnDef::new(RegistrationAttempt::AttemptedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_registration_attempt_fingerprint")
                    .table(RegistrationAttempt::Table)
                    .col(RegistrationAttempt::Fingerprint)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            RegistrationAttempt::Table.into_iden(),
            Invitation::Table.into_iden(),
            Hashtag::Table.into_iden(),
            Like::Table.into_iden(),
            Share::Table.into_iden(),
            Bookmark::Table.into_iden(),
            Certificate::Table.into_iden(),
            InboxItem::Table.into_iden(),
            DeliveryItem::Table.into_iden(),
            Activity::Table.into_iden(),
            FollowEdge::Table.into_iden(),
            Vote::Table.into_iden(),
            PollOption::Table.into_iden(),
            Object::Table.into_iden(),
            Actor::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Actor {
    Table,
    Id,
    Local,
    PreferredUsername,
    Domain,
    ActorType,
    DisplayName,
    Summary,
    AvatarUrl,
    InboxUrl,
    SharedInboxUrl,
    OutboxUrl,
    FollowersUrl,
    PublicKeyPem,
    PrivateKeyPem,
    KeyAlgorithm,
    MovedTo,
    AlsoKnownAs,
    Gone,
    FirstCertFingerprint,
    CreatedAt,
    UpdatedAt,
    LastRefreshedAt,
    LastPostAt,
    LastEditAt,
    LastBoostAt,
    LastBookmarkAt,
    LastFollowAt,
    LastAliasAt,
    LastMoveAt,
    LastNameAt,
    LastAvatarAt,
}

#[derive(DeriveIden)]
enum Object {
    Table,
    Id,
    Local,
    AttributedTo,
    InReplyTo,
    Content,
    To,
    Cc,
    Audience,
    Bto,
    Bcc,
    Tag,
    Attachment,
    IsPoll,
    PollClosesAt,
    PollMultiple,
    RawActivity,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum PollOption {
    Table,
    Id,
    ObjectId,
    Position,
    Name,
    Votes,
}

#[derive(DeriveIden)]
enum Vote {
    Table,
    Id,
    ObjectId,
    ActorId,
    PollOptionId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum FollowEdge {
    Table,
    Id,
    FollowerId,
    FollowedId,
    FollowActivityId,
    Accepted,
    Since,
    LastPostAt,
}

#[derive(DeriveIden)]
enum Activity {
    Table,
    Id,
    Local,
    ActivityType,
    ActorId,
    ObjectId,
    TargetId,
    To,
    Cc,
    RawBody,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DeliveryItem {
    Table,
    Id,
    ActivityId,
    SenderActorId,
    TargetInbox,
    Attempts,
    NextAttemptAt,
    Terminal,
    TerminalReason,
    CreatedAt,
    Sequence,
}

#[derive(DeriveIden)]
enum InboxItem {
    Table,
    Id,
    RawBody,
    Headers,
    SenderHint,
    TargetActorId,
    ReceivedAt,
    Attempts,
    NextAttemptAt,
    Terminal,
    TerminalReason,
}

#[derive(DeriveIden)]
enum Certificate {
    Table,
    Fingerprint,
    ActorId,
    Approved,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Bookmark {
    Table,
    Id,
    ActorId,
    ObjectId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Share {
    Table,
    Id,
    ActorId,
    ObjectId,
    AnnounceActivityId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Like {
    Table,
    Id,
    ActorId,
    ObjectId,
    LikeActivityId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Hashtag {
    Table,
    Id,
    ObjectId,
    TagLower,
    TagDisplay,
}

#[derive(DeriveIden)]
enum Invitation {
    Table,
    Code,
    UsedByActorId,
    CreatedAt,
    UsedAt,
}

#[derive(DeriveIden)]
enum RegistrationAttempt {
    Table,
    Id,
    Fingerprint,
    AttemptedAt,
}
