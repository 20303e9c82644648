use crate::application::service::ServiceDependencies;
use crate::application::{Actor, ApplicationError, Role};
use crate::domain::model::{BookId, Review, ReviewId, ReviewThread, MAX_RATING, MIN_RATING};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// 書籍のレビュー一覧
#[derive(Debug, Clone, PartialEq)]
pub struct BookReviews {
    pub book_id: BookId,
    /// レビュー本体の評価の平均（小数第1位に丸める）。レビューが無ければ `None`
    pub average_rating: Option<Decimal>,
    pub threads: Vec<ReviewThread>,
}

/// レビューアプリケーションサービス
/// レビューと返信は、その書籍をキャンセルしていない注文で購入した利用者だけが投稿できる
pub struct ReviewApplicationService {
    deps: ServiceDependencies,
}

impl ReviewApplicationService {
    pub fn new(deps: ServiceDependencies) -> Self {
        Self { deps }
    }

    /// レビューを投稿する
    ///
    /// # Arguments
    /// * `rating` - 範囲外の値も受け取り、ここで検証する
    ///
    /// # Returns
    /// * `Err(ApplicationError::Unauthorized)` - 購入していない
    /// * `Err(ApplicationError::Conflict)` - 既にレビュー済み
    pub async fn submit_review(
        &self,
        actor: &Actor,
        book_id: BookId,
        rating: i64,
        comment: String,
    ) -> Result<Review, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let rating = u8::try_from(rating)
            .ok()
            .filter(|rating| (MIN_RATING..=MAX_RATING).contains(rating))
            .ok_or_else(|| {
                ApplicationError::Validation("Rating must be between 1 and 5.".to_string())
            })?;
        let correlation_id = self
            .deps
            .begin("ReviewService", "Submitting review", actor.user_id);
        self.ensure_book_exists(book_id).await?;

        if !self.deps.orders.has_purchased(actor.user_id, book_id).await? {
            return Err(ApplicationError::Unauthorized(
                "You can only review books you have purchased.".to_string(),
            ));
        }
        if self.deps.reviews.has_top_level(actor.user_id, book_id).await? {
            return Err(already_reviewed());
        }

        let review = Review::top_level(
            book_id,
            actor.user_id,
            actor.display_name.clone(),
            rating,
            comment,
            self.deps.clock.now(),
        )?;
        // 確認から登録までの間に同じ利用者のレビューが入った場合
        if !self.deps.reviews.insert(&review).await? {
            return Err(already_reviewed());
        }

        let mut context = HashMap::new();
        context.insert("book_id".to_string(), book_id.to_string());
        context.insert("rating".to_string(), rating.to_string());
        self.deps.logger.info(
            "ReviewService",
            "Review submitted",
            Some(correlation_id),
            Some(context),
        );
        Ok(review)
    }

    /// レビュー本体に返信する
    /// 親は同じ書籍のレビュー本体でなければならない
    pub async fn reply(
        &self,
        actor: &Actor,
        book_id: BookId,
        parent_id: ReviewId,
        comment: String,
    ) -> Result<Review, ApplicationError> {
        actor.require_any(&[Role::User, Role::Member])?;
        let correlation_id = self
            .deps
            .begin("ReviewService", "Replying to review", actor.user_id);
        self.ensure_book_exists(book_id).await?;

        let parent = self
            .deps
            .reviews
            .find_by_id(parent_id)
            .await?
            .filter(|parent| parent.book_id() == book_id && parent.is_top_level())
            .ok_or_else(|| {
                ApplicationError::NotFound("Parent review not found or invalid.".to_string())
            })?;

        if !self.deps.orders.has_purchased(actor.user_id, book_id).await? {
            return Err(ApplicationError::Unauthorized(
                "You must purchase the book before replying to a review.".to_string(),
            ));
        }

        let reply = Review::reply_to(
            &parent,
            actor.user_id,
            actor.display_name.clone(),
            comment,
            self.deps.clock.now(),
        )?;
        self.deps.reviews.insert(&reply).await?;

        let mut context = HashMap::new();
        context.insert("book_id".to_string(), book_id.to_string());
        context.insert("parent_id".to_string(), parent_id.to_string());
        self.deps.logger.info(
            "ReviewService",
            "Reply posted",
            Some(correlation_id),
            Some(context),
        );
        Ok(reply)
    }

    /// 書籍のレビューを返信付きで取得する
    pub async fn reviews_for_book(&self, book_id: BookId) -> Result<BookReviews, ApplicationError> {
        self.ensure_book_exists(book_id).await?;
        let top_level = self.deps.reviews.find_top_level(book_id).await?;
        let parent_ids: Vec<ReviewId> = top_level.iter().map(Review::id).collect();
        let replies = self.deps.reviews.find_replies(&parent_ids).await?;

        Ok(BookReviews {
            book_id,
            average_rating: average_rating(&top_level),
            threads: ReviewThread::assemble(top_level, replies),
        })
    }

    async fn ensure_book_exists(&self, book_id: BookId) -> Result<(), ApplicationError> {
        if self.deps.catalog.find_by_id(book_id).await?.is_none() {
            return Err(ApplicationError::NotFound("Book not found.".to_string()));
        }
        Ok(())
    }
}

fn already_reviewed() -> ApplicationError {
    ApplicationError::Conflict("You have already reviewed this book.".to_string())
}

fn average_rating(reviews: &[Review]) -> Option<Decimal> {
    let ratings: Vec<Decimal> = reviews
        .iter()
        .filter_map(Review::rating)
        .map(Decimal::from)
        .collect();
    if ratings.is_empty() {
        return None;
    }
    let total: Decimal = ratings.iter().sum();
    Some((total / Decimal::from(ratings.len())).round_dp(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::UserId;
    use chrono::Utc;

    fn rated(rating: u8) -> Review {
        Review::top_level(
            BookId::new(),
            UserId::new(),
            "Reader".to_string(),
            rating,
            "ok".to_string(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_average_rating_rounds_to_one_decimal() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(
            average_rating(&[rated(5), rated(4), rated(4)]),
            Some(Decimal::new(43, 1))
        );
    }
}
