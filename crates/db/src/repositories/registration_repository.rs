//! Registration-attempt repository (spec §4.5, §6
//! `MaxRegistrationsPerCertPerHour`).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tootik_common::AppResult;

use crate::entities::registration_attempt::{ActiveModel, Column, Entity};

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationRepository;

impl RegistrationRepository {
    pub async fn record<C: ConnectionTrait>(&self, db: &C, fingerprint: &str) -> AppResult<()> {
        let am = ActiveModel {
            fingerprint: Set(fingerprint.to_string()),
            attempted_at: Set(Utc::now()),
            ..Default::default()
        };
        am.insert(db).await?;
        Ok(())
    }

    /// Attempts from `fingerprint` since `since`, for the per-hour cap.
    pub async fn count_since<C: ConnectionTrait>(&self, db: &C, fingerprint: &str, since: DateTime<Utc>) -> AppResult<u64> {
        Ok(Entity::find()
            .filter(Column::Fingerprint.eq(fingerprint))
            .filter(Column::AttemptedAt.gte(since))
            .count(db)
            .await?)
    }
}
