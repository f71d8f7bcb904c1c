use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

/// Заголовок с идентификатором пользователя, который проставляет
/// внешний слой аутентификации
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the caller's user id
/// Usage in handlers: `async fn handler(CurrentUser(user_id): CurrentUser) -> Response`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CurrentUser(value.to_string()))
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
