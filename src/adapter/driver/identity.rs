use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::Json,
};

use crate::adapter::driver::rest_api::ApiError;
use crate::application::{Actor, Role};
use crate::domain::model::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// 認証済みの呼び出し元
/// 前段のゲートウェイが付与する `x-user-*` ヘッダーから組み立てる
pub struct CurrentActor(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// ヘッダーから呼び出し元を読み取る
/// ユーザーIDが無い、または形式が不正な場合は None。未知のロールは無視する
pub fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let user_id = UserId::from_string(header(headers, USER_ID_HEADER)?).ok()?;
    let email = header(headers, USER_EMAIL_HEADER).unwrap_or_default().to_string();
    let display_name = header(headers, USER_NAME_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| email.clone());
    let roles = header(headers, USER_ROLES_HEADER)
        .map(|raw| raw.split(',').filter_map(Role::from_string).collect())
        .unwrap_or_default();

    Some(Actor::new(user_id, email, display_name, roles))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
            .map(CurrentActor)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ApiError {
                        error: "Please sign in to continue.".to_string(),
                        code: "UNAUTHENTICATED".to_string(),
                    }),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_from_headers() {
        let user_id = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&user_id.to_string()).unwrap());
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("ada@example.com"));
        headers.insert(USER_ROLES_HEADER, HeaderValue::from_static("Member, staff, guest"));

        let actor = actor_from_headers(&headers).unwrap();

        assert_eq!(actor.user_id, user_id);
        assert_eq!(actor.display_name, "ada@example.com");
        assert_eq!(actor.roles, vec![Role::Member, Role::Staff]);
    }

    #[test]
    fn test_missing_or_invalid_user_id() {
        let mut headers = HeaderMap::new();
        assert!(actor_from_headers(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(actor_from_headers(&headers).is_none());
    }
}
