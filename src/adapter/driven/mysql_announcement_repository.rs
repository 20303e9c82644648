use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_catalog_repository::fetch_failed;
use crate::domain::model::{AnnouncementId, TimedAnnouncement};
use crate::domain::port::{AnnouncementRepository, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row};

const ANNOUNCEMENT_COLUMNS: &str = "id, title, message, starts_at, expires_at, created_at";

fn announcement_from_row(row: &MySqlRow) -> Result<TimedAnnouncement, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| fetch_failed("id", e))?;
    let time = |column: &str| -> Result<DateTime<Utc>, RepositoryError> {
        row.try_get(column).map_err(|e| fetch_failed(column, e))
    };
    Ok(TimedAnnouncement::reconstruct(
        AnnouncementId::from_string(&id).map_err(|e| fetch_failed("id", e))?,
        row.try_get("title").map_err(|e| fetch_failed("title", e))?,
        row.try_get("message").map_err(|e| fetch_failed("message", e))?,
        time("starts_at")?,
        time("expires_at")?,
        time("created_at")?,
    ))
}

/// MySQLお知らせリポジトリ
#[derive(Clone)]
pub struct MySqlAnnouncementRepository {
    pool: Pool<MySql>,
}

impl MySqlAnnouncementRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnnouncementRepository for MySqlAnnouncementRepository {
    async fn find_unexpired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimedAnnouncement>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM announcements WHERE expires_at >= ? ORDER BY starts_at DESC",
            ANNOUNCEMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("お知らせ一覧の取得に失敗しました", e))?;

        rows.iter().map(announcement_from_row).collect()
    }

    async fn find_by_id(
        &self,
        id: AnnouncementId,
    ) -> Result<Option<TimedAnnouncement>, RepositoryError> {
        let sql = format!("SELECT {} FROM announcements WHERE id = ?", ANNOUNCEMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("お知らせの取得に失敗しました", e))?;

        row.as_ref().map(announcement_from_row).transpose()
    }

    async fn save(&self, announcement: &TimedAnnouncement) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO announcements (id, title, message, starts_at, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                title = VALUES(title),
                message = VALUES(message),
                starts_at = VALUES(starts_at),
                expires_at = VALUES(expires_at)
            "#,
        )
        .bind(announcement.id().to_string())
        .bind(announcement.title())
        .bind(announcement.message())
        .bind(announcement.starts_at())
        .bind(announcement.expires_at())
        .bind(announcement.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("お知らせの保存に失敗しました", e))?;

        Ok(())
    }

    async fn delete(&self, id: AnnouncementId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("お知らせの削除に失敗しました", e))?;

        Ok(result.rows_affected() > 0)
    }
}
