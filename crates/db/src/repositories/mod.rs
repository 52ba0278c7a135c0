//! Repositories: the only code in the workspace that issues `SeaORM`
//! queries. Every throttle (spec §4.5, §9) is a conditional `UPDATE`
//! against a per-actor timestamp column, never an in-process lock, so
//! concurrent request-handler tasks enforce them without coordination.

pub mod activity_repository;
pub mod actor_repository;
pub mod certificate_repository;
pub mod delivery_repository;
pub mod follow_repository;
pub mod hashtag_repository;
pub mod inbox_repository;
pub mod invitation_repository;
pub mod like_bookmark_share_repository;
pub mod object_repository;
pub mod registration_repository;
pub mod vote_repository;

pub use activity_repository::ActivityRepository;
pub use actor_repository::{ActorRepository, ThrottleKind};
pub use certificate_repository::CertificateRepository;
pub use delivery_repository::DeliveryRepository;
pub use follow_repository::FollowRepository;
pub use hashtag_repository::HashtagRepository;
pub use inbox_repository::InboxRepository;
pub use invitation_repository::InvitationRepository;
pub use like_bookmark_share_repository::{BookmarkRepository, LikeRepository, ShareRepository};
pub use object_repository::ObjectRepository;
pub use registration_repository::RegistrationRepository;
pub use vote_repository::VoteRepository;
