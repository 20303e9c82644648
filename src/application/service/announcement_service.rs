use crate::application::service::ServiceDependencies;
use crate::application::{Actor, ApplicationError, Role};
use crate::domain::model::{AnnouncementId, TimedAnnouncement};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// お知らせの入力
/// 掲示期間を省略した場合、作成時は現在時刻から既定日数、更新時は現在の値を使う
#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncementDraft {
    pub title: String,
    pub message: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// お知らせアプリケーションサービス
pub struct AnnouncementApplicationService {
    deps: ServiceDependencies,
}

impl AnnouncementApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// 失効していないお知らせを掲示開始日時の新しい順に取得する
    /// 失効したお知らせは削除されず、読み出し時に除外される
    pub async fn active(&self) -> Result<Vec<TimedAnnouncement>, ApplicationError> {
        let now = self.deps.clock.now();
        Ok(self.deps.announcements.find_unexpired(now).await?)
    }

    /// お知らせを掲示する（管理者のみ）
    pub async fn create(
        &self,
        actor: &Actor,
        draft: AnnouncementDraft,
    ) -> Result<TimedAnnouncement, ApplicationError> {
        actor.require_any(&[Role::Admin])?;
        let correlation_id = self
            .deps
            .begin("AnnouncementService", "Posting announcement", actor.user_id);

        let now = self.deps.clock.now();
        let starts_at = draft.starts_at.unwrap_or(now);
        let expires_at = draft
            .expires_at
            .unwrap_or_else(|| TimedAnnouncement::default_expiry(starts_at));
        let announcement =
            TimedAnnouncement::new(draft.title, draft.message, starts_at, expires_at, now)?;
        self.deps.announcements.save(&announcement).await?;

        self.log_saved(&announcement, "Announcement posted", correlation_id);
        Ok(announcement)
    }

    /// お知らせを書き換える（管理者のみ）
    ///
    /// # Returns
    /// * `Err(ApplicationError::NotFound)` - お知らせが存在しない
    pub async fn update(
        &self,
        actor: &Actor,
        id: AnnouncementId,
        draft: AnnouncementDraft,
    ) -> Result<TimedAnnouncement, ApplicationError> {
        actor.require_any(&[Role::Admin])?;
        let correlation_id = self
            .deps
            .begin("AnnouncementService", "Revising announcement", actor.user_id);

        let mut announcement = self.find(id).await?;
        let starts_at = draft.starts_at.unwrap_or(announcement.starts_at());
        let expires_at = draft.expires_at.unwrap_or(announcement.expires_at());
        announcement.revise(draft.title, draft.message, starts_at, expires_at)?;
        self.deps.announcements.save(&announcement).await?;

        self.log_saved(&announcement, "Announcement revised", correlation_id);
        Ok(announcement)
    }

    /// お知らせを取り下げる（管理者のみ）
    pub async fn delete(&self, actor: &Actor, id: AnnouncementId) -> Result<(), ApplicationError> {
        actor.require_any(&[Role::Admin])?;
        self.deps
            .begin("AnnouncementService", "Removing announcement", actor.user_id);
        if !self.deps.announcements.delete(id).await? {
            return Err(ApplicationError::NotFound(
                "Announcement not found.".to_string(),
            ));
        }
        Ok(())
    }

    async fn find(&self, id: AnnouncementId) -> Result<TimedAnnouncement, ApplicationError> {
        self.deps
            .announcements
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound("Announcement not found.".to_string()))
    }

    fn log_saved(&self, announcement: &TimedAnnouncement, message: &str, correlation_id: uuid::Uuid) {
        let mut context = HashMap::new();
        context.insert("announcement_id".to_string(), announcement.id().to_string());
        context.insert(
            "expires_at".to_string(),
            announcement.expires_at().to_rfc3339(),
        );
        self.deps.logger.info(
            "AnnouncementService",
            message,
            Some(correlation_id),
            Some(context),
        );
    }
}
