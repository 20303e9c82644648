use crate::domain::error::DomainError;
use crate::domain::model::{BookId, ReviewId, UserId};
use chrono::{DateTime, Utc};

/// 評価の下限
pub const MIN_RATING: u8 = 1;
/// 評価の上限
pub const MAX_RATING: u8 = 5;

/// 書籍レビュー
/// 親を持たないものがレビュー本体、親を持つものはそのレビューへの返信。
/// 返信はレビュー本体にだけ付けられ、返信への返信は作らない
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    id: ReviewId,
    book_id: BookId,
    user_id: UserId,
    author_name: String,
    parent: Option<ReviewId>,
    /// 返信には評価が無い
    rating: Option<u8>,
    comment: String,
    reviewed_at: DateTime<Utc>,
}

impl Review {
    /// レビュー本体を作成
    ///
    /// # Arguments
    /// * `rating` - 1から5までの評価
    /// * `comment` - 本文（空不可）
    pub fn top_level(
        book_id: BookId,
        user_id: UserId,
        author_name: String,
        rating: u8,
        comment: String,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(DomainError::InvalidValue(
                "Rating must be between 1 and 5.".to_string(),
            ));
        }
        Ok(Self {
            id: ReviewId::new(),
            book_id,
            user_id,
            author_name,
            parent: None,
            rating: Some(rating),
            comment: required_comment(comment)?,
            reviewed_at,
        })
    }

    /// レビュー本体への返信を作成
    /// 親が返信の場合はエラー
    pub fn reply_to(
        parent: &Review,
        user_id: UserId,
        author_name: String,
        comment: String,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !parent.is_top_level() {
            return Err(DomainError::InvalidValue(
                "Parent review not found or invalid.".to_string(),
            ));
        }
        Ok(Self {
            id: ReviewId::new(),
            book_id: parent.book_id,
            user_id,
            author_name,
            parent: Some(parent.id),
            rating: None,
            comment: required_comment(comment)?,
            reviewed_at,
        })
    }

    /// データベースから取得したデータでレビューを再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: ReviewId,
        book_id: BookId,
        user_id: UserId,
        author_name: String,
        parent: Option<ReviewId>,
        rating: Option<u8>,
        comment: String,
        reviewed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            book_id,
            user_id,
            author_name,
            parent,
            rating,
            comment,
            reviewed_at,
        }
    }

    pub fn id(&self) -> ReviewId {
        self.id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub fn parent(&self) -> Option<ReviewId> {
        self.parent
    }

    pub fn rating(&self) -> Option<u8> {
        self.rating
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn reviewed_at(&self) -> DateTime<Utc> {
        self.reviewed_at
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

fn required_comment(comment: String) -> Result<String, DomainError> {
    let comment = comment.trim().to_string();
    if comment.is_empty() {
        return Err(DomainError::InvalidValue("Comment is required.".to_string()));
    }
    Ok(comment)
}

/// レビュー本体と、その直下の返信
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewThread {
    pub review: Review,
    pub replies: Vec<Review>,
}

impl ReviewThread {
    /// レビュー本体ごとに返信を1階層だけ束ねる
    /// 本体は新しい順、返信は古い順に並べる。親の無い返信は捨てる
    pub fn assemble(top_level: Vec<Review>, replies: Vec<Review>) -> Vec<ReviewThread> {
        let mut threads: Vec<ReviewThread> = top_level
            .into_iter()
            .filter(Review::is_top_level)
            .map(|review| ReviewThread {
                review,
                replies: Vec::new(),
            })
            .collect();
        threads.sort_by(|a, b| b.review.reviewed_at.cmp(&a.review.reviewed_at));

        for reply in replies {
            let Some(parent) = reply.parent else { continue };
            if let Some(thread) = threads.iter_mut().find(|t| t.review.id == parent) {
                thread.replies.push(reply);
            }
        }
        for thread in &mut threads {
            thread.replies.sort_by_key(|reply| reply.reviewed_at);
        }
        threads
    }
}
