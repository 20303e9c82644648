// 注文確認メール（請求明細）の生成

use crate::domain::model::{Order, UserId};
use crate::domain::pricing::Quote;
use chrono::{DateTime, Utc};

/// 注文確認メールの件名
pub const RECEIPT_SUBJECT: &str = "Your Order Confirmation";

const HEADING: &str = "font-family: Arial, sans-serif; color: #333;";
const TEXT: &str = "font-family: Arial, sans-serif; color: #555;";
const CELL: &str = "padding: 8px;";

/// チェックアウト結果からHTMLの請求明細を組み立てる
///
/// # Arguments
/// * `customer_name` - 宛名
/// * `user_id` - 受け取り時に提示してもらうユーザーID
/// * `placed_at` - 注文日時
/// * `quote` - 確定時に再計算した見積もり
/// * `orders` - 作成した注文（引換コードを表示する）
pub fn render_receipt(
    customer_name: &str,
    user_id: UserId,
    placed_at: DateTime<Utc>,
    quote: &Quote,
    orders: &[Order],
) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<h2 style='{}'>Order Confirmation for {}</h2>\n",
        HEADING,
        escape(customer_name)
    ));
    html.push_str(&format!(
        "<p style='{}'>Order Date: {}</p>\n",
        TEXT,
        placed_at.format("%d %b %Y %H:%M")
    ));
    html.push_str(&format!("<p style='{}'>User ID: {}</p>\n", TEXT, user_id));
    html.push_str(&format!("<h3 style='{}'>Order Details</h3>\n", HEADING));
    html.push_str(&format!(
        "<table border='1' style='border-collapse: collapse; width: 100%; {}'>\n",
        TEXT
    ));
    html.push_str(&format!(
        "<tr style='background-color: #f2f2f2;'>{}</tr>\n",
        ["Book Title", "Author", "Quantity", "Original Price", "Discounted Price", "Claim Code"]
            .iter()
            .map(|header| format!("<th style='{}'>{}</th>", CELL, header))
            .collect::<String>()
    ));

    for line in &quote.lines {
        let claim_code = orders
            .iter()
            .find(|order| order.book_id() == line.book_id)
            .map(|order| order.claim_code().to_string())
            .unwrap_or_default();
        // 期間割引が無い行はカート割引後の金額ではなく小計を表示する
        let shown_price = if line.price.has_active_discount() {
            line.line_total
        } else {
            line.line_subtotal
        };

        let cells = [
            escape(&line.title),
            escape(&line.author),
            line.quantity.to_string(),
            line.line_subtotal.to_string(),
            shown_price.to_string(),
            claim_code,
        ];
        html.push_str("<tr>\n");
        for cell in cells {
            html.push_str(&format!("<td style='{}'>{}</td>\n", CELL, cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");

    html.push_str(&format!(
        "<h3 style='{} margin-top: 20px;'>Billing Summary</h3>\n",
        HEADING
    ));
    html.push_str(&format!("<p style='{}'>Total Items: {}</p>\n", TEXT, quote.total_items));
    html.push_str(&format!("<p style='{}'>Total Price: {}</p>\n", TEXT, quote.subtotal));
    html.push_str(&format!(
        "<p style='{}'>Discount Applied: {}</p>\n",
        TEXT, quote.discount_amount
    ));
    html.push_str(&format!(
        "<p style='{} font-weight: bold;'>Final Price: {}</p>\n",
        TEXT, quote.final_total
    ));
    html.push_str(&format!(
        "<p style='{} margin-top: 20px;'>Please present your user ID and claim code at the store for in-store pickup.</p>\n",
        TEXT
    ));
    html
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Book, BookId, ClaimCode, Money, OrderKey};
    use crate::domain::pricing::{quote, PricingPolicy};
    use rust_decimal::Decimal;

    #[test]
    fn test_receipt_lists_lines_and_summary() {
        let now = Utc::now();
        let user_id = UserId::new();
        let book = Book::new(
            BookId::new(),
            "Tom & Jerry <Collected>".to_string(),
            "Hanna".to_string(),
            Money::usd(Decimal::from(10)),
            10,
        )
        .unwrap();
        let quote = quote(&PricingPolicy::default(), &[(book.clone(), 5)], &[], 0, now);
        let code = ClaimCode::parse("ABCD1234").unwrap();
        let order = Order::place(
            OrderKey::new(user_id, book.id(), now),
            "Ada".to_string(),
            5,
            quote.lines[0].line_total,
            code,
        )
        .unwrap();

        let html = render_receipt("Ada", user_id, now, &quote, &[order]);

        assert!(html.contains("Order Confirmation for Ada"));
        assert!(html.contains("Tom &amp; Jerry &lt;Collected&gt;"));
        assert!(html.contains("ABCD1234"));
        assert!(html.contains(&format!("User ID: {}", user_id)));
        assert!(html.contains("Total Items: 5"));
        assert!(html.contains("Total Price: $50.00"));
        assert!(html.contains("Discount Applied: $2.50"));
        assert!(html.contains("Final Price: $47.50"));
    }
}
