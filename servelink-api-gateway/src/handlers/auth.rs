use axum::{
    Form, Router,
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::{get, post},
};
use servelink_service::{ServiceError, staff};
use tracing::instrument;

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db, extract_user_id_from_token};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/auth/token", post(issue_token))
        .route("/me", get(get_user_profile))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created successfully", body = CreateUserResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 409, description = "Username already taken", body = ApiErrorResponse),
        (status = 503, description = "Service unavailable", body = ApiErrorResponse),
    ),
    tag = "users"
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, ApiError> {
    let mut conn = db(&state).await?;
    let (user, _profile) = state
        .auth
        .create_user(
            &mut conn,
            &payload.username,
            &payload.passphrase,
            payload.full_name,
        )
        .await?;

    Ok(Json(CreateUserResponse {
        id: user.id,
        username: user.username,
        created_at: user.created_at,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/token",
    request_body(content = IssueTokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token issued successfully", body = IssueTokenResponse),
        (status = 401, description = "Invalid credentials", body = ApiErrorResponse),
        (status = 503, description = "Service unavailable", body = ApiErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn issue_token(
    State(state): State<AppState>,
    Form(payload): Form<IssueTokenRequest>,
) -> Result<Json<IssueTokenResponse>, ApiError> {
    // Validate grant_type
    if payload.grant_type != "password" {
        return Err(ApiError::AuthenticationFailed);
    }

    let mut conn = db(&state).await?;
    let token = state
        .auth
        .issue_token(&mut conn, &payload.username, &payload.password)
        .await?;

    Ok(Json(IssueTokenResponse {
        token_type: token.token_type,
        access_token: token.access_token,
        expires_in: token.expires_in,
    }))
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile of the signed-in user", body = UserProfile),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 503, description = "Service unavailable", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "users"
)]
#[instrument(skip(state, headers))]
pub async fn get_user_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;

    let member = staff::get_member(&mut conn, user_id)
        .await
        .map_err(|err| match err {
            // Token outlived the account.
            ServiceError::NotFound(_) => ApiError::InvalidToken,
            other => other.into(),
        })?;

    Ok(Json(member.into()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::handlers::test_support;

    #[tokio::test]
    async fn test_profile_requires_bearer_token() {
        let app = router().with_state(test_support::state());

        let response = app
            .clone()
            .oneshot(Request::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::get("/me")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_issue_token_rejects_other_grants() {
        let app = router().with_state(test_support::state());

        let response = app
            .oneshot(
                Request::post("/auth/token")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "grant_type=client_credentials&username=chef&password=secret",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
