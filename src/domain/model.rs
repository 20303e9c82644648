// ドメインモデル（エンティティと値オブジェクト）

mod announcement;
mod book;
mod cart;
mod claim_code;
mod discount;
mod order;
mod review;
mod value_objects;

pub use value_objects::{
    AnnouncementId, BookId, Currency, DiscountRate, Money, OrderStatus, ReviewId, UserId,
};

pub use announcement::{TimedAnnouncement, DEFAULT_ANNOUNCEMENT_DAYS};
pub use book::Book;
pub use cart::{Cart, CartEntry};
pub use claim_code::{ClaimCode, CLAIM_CODE_LENGTH};
pub use discount::DiscountPeriod;
pub use order::{Order, OrderKey, CANCELLATION_WINDOW_HOURS};
pub use review::{Review, ReviewThread, MAX_RATING, MIN_RATING};
