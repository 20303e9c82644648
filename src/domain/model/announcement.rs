use crate::domain::error::DomainError;
use crate::domain::model::AnnouncementId;
use chrono::{DateTime, Duration, Utc};

/// 掲示期間を指定しない場合の掲示日数
pub const DEFAULT_ANNOUNCEMENT_DAYS: i64 = 5;

/// 期間付きのお知らせ
/// 失効はスケジューラーではなく、読み出し時に `is_expired_at` で判定する
#[derive(Debug, Clone, PartialEq)]
pub struct TimedAnnouncement {
    id: AnnouncementId,
    title: String,
    message: String,
    starts_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TimedAnnouncement {
    /// 新しいお知らせを作成
    ///
    /// # Arguments
    /// * `title` - 見出し（空不可）
    /// * `message` - 本文（空不可）
    /// * `starts_at` - 掲示開始日時
    /// * `expires_at` - 掲示終了日時（開始日時以降）
    /// * `created_at` - 作成日時
    pub fn new(
        title: String,
        message: String,
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let (title, message) = validate(title, message, starts_at, expires_at)?;
        Ok(Self {
            id: AnnouncementId::new(),
            title,
            message,
            starts_at,
            expires_at,
            created_at,
        })
    }

    /// データベースから取得したデータでお知らせを再構築
    pub fn reconstruct(
        id: AnnouncementId,
        title: String,
        message: String,
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            message,
            starts_at,
            expires_at,
            created_at,
        }
    }

    /// 開始日時から既定の掲示期間を求める
    pub fn default_expiry(starts_at: DateTime<Utc>) -> DateTime<Utc> {
        starts_at + Duration::days(DEFAULT_ANNOUNCEMENT_DAYS)
    }

    pub fn id(&self) -> AnnouncementId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 指定時刻に失効しているか（終了日時ちょうどはまだ掲示中）
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// 見出し・本文・掲示期間を書き換える（作成日時は変えない）
    pub fn revise(
        &mut self,
        title: String,
        message: String,
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let (title, message) = validate(title, message, starts_at, expires_at)?;
        self.title = title;
        self.message = message;
        self.starts_at = starts_at;
        self.expires_at = expires_at;
        Ok(())
    }
}

fn validate(
    title: String,
    message: String,
    starts_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(String, String), DomainError> {
    let title = title.trim().to_string();
    let message = message.trim().to_string();
    if title.is_empty() {
        return Err(DomainError::InvalidValue("title is required".to_string()));
    }
    if message.is_empty() {
        return Err(DomainError::InvalidValue("message is required".to_string()));
    }
    if expires_at < starts_at {
        return Err(DomainError::InvalidValue(
            "announcement expiry must not be before its start".to_string(),
        ));
    }
    Ok((title, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_boundary_is_still_visible() {
        let start = noon();
        let notice = TimedAnnouncement::new(
            "Summer hours".to_string(),
            "Open until 9pm".to_string(),
            start,
            TimedAnnouncement::default_expiry(start),
            start,
        )
        .unwrap();

        assert_eq!(notice.expires_at(), start + Duration::days(5));
        assert!(!notice.is_expired_at(notice.expires_at()));
        assert!(notice.is_expired_at(notice.expires_at() + Duration::seconds(1)));
    }

    #[test]
    fn test_invalid_announcements_are_rejected() {
        let start = noon();
        assert!(TimedAnnouncement::new(" ".to_string(), "m".to_string(), start, start, start).is_err());
        assert!(TimedAnnouncement::new("t".to_string(), "".to_string(), start, start, start).is_err());
        assert!(TimedAnnouncement::new(
            "t".to_string(),
            "m".to_string(),
            start,
            start - Duration::hours(1),
            start
        )
        .is_err());
    }

    #[test]
    fn test_revise_keeps_identity_and_creation_time() {
        let start = noon();
        let mut notice =
            TimedAnnouncement::new("Old".to_string(), "Text".to_string(), start, start, start)
                .unwrap();
        let id = notice.id();

        notice
            .revise(
                "New".to_string(),
                "Updated text".to_string(),
                start,
                start + Duration::days(2),
            )
            .unwrap();

        assert_eq!(notice.id(), id);
        assert_eq!(notice.title(), "New");
        assert_eq!(notice.created_at(), start);
        assert!(notice
            .revise("".to_string(), "x".to_string(), start, start)
            .is_err());
        assert_eq!(notice.title(), "New");
    }
}
