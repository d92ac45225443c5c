//! Verification flow endpoints: start, display-access check, redemption, and
//! the session probe.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::gate::flow::{StartError, VerificationFlow};
use crate::gate::token::{self, RedeemError, TOKEN_TTL_SECONDS};

/// Browser-scoped identity cookie; keys guard entries and session grants.
pub(crate) const SESSION_COOKIE_NAME: &str = "tollgate_uid";

const RETRY_PAGE: &str = r#"<!doctype html>
<html>
  <body>
    <h1>Redirect generation failed</h1>
    <p>The URL shortener is currently unavailable. Please try again.</p>
    <a href="/verify/start">Try again</a>
  </body>
</html>"#;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenPayload {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionStatus {
    pub verified: bool,
}

#[utoipa::path(
    get,
    path = "/verify/start",
    responses(
        (status = 302, description = "Redirect to the external short link"),
        (status = 503, description = "Shortener unavailable, retry later"),
        (status = 500, description = "Token issuance failed"),
    ),
    tag = "verify",
)]
#[instrument(skip(flow, headers))]
pub async fn start(
    Extension(flow): Extension<Arc<VerificationFlow>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (session_id, fresh) = session_identity(&headers);

    match flow.start(&session_id).await {
        Ok(outcome) => {
            let Ok(location) = HeaderValue::from_str(&outcome.short_url) else {
                error!("Short link is not a valid header value");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Invalid short link".to_string(),
                )
                    .into_response();
            };

            let mut response_headers = HeaderMap::new();
            response_headers.insert(LOCATION, location);
            if fresh {
                if let Ok(cookie) = session_cookie(&session_id) {
                    response_headers.insert(SET_COOKIE, cookie);
                }
            }
            (StatusCode::FOUND, response_headers).into_response()
        }
        Err(StartError::ShortenerUnavailable) => {
            (StatusCode::SERVICE_UNAVAILABLE, Html(RETRY_PAGE)).into_response()
        }
        Err(StartError::Issuance(err)) => {
            error!("Failed to issue token: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start verification".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/verify/check-access",
    request_body = TokenPayload,
    responses(
        (status = 200, description = "Display access granted", body = VerifyResponse),
        (status = 403, description = "Invalid access path", body = VerifyResponse),
    ),
    tag = "verify",
)]
#[instrument(skip(flow, headers, payload))]
pub async fn check_access(
    Extension(flow): Extension<Arc<VerificationFlow>>,
    headers: HeaderMap,
    payload: Option<Json<TokenPayload>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return denied();
    };
    let Some(session_id) = extract_cookie(&headers, SESSION_COOKIE_NAME) else {
        return denied();
    };
    // Malformed token values never reach the guard store.
    if !token::valid_format(&payload.token) {
        return denied();
    }

    if flow.validate_display_access(&session_id, &payload.token) {
        (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                message: None,
            }),
        )
            .into_response()
    } else {
        denied()
    }
}

// One generic denial for every guard failure; the sub-reason stays internal.
fn denied() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(VerifyResponse {
            success: false,
            message: Some("Invalid access path".to_string()),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/verify/token",
    request_body = TokenPayload,
    responses(
        (status = 200, description = "Token redeemed, session verified", body = VerifyResponse),
        (status = 400, description = "Token already used or expired", body = VerifyResponse),
        (status = 404, description = "Token not found", body = VerifyResponse),
    ),
    tag = "verify",
)]
#[instrument(skip(flow, headers, payload))]
pub async fn redeem(
    Extension(flow): Extension<Arc<VerificationFlow>>,
    headers: HeaderMap,
    payload: Option<Json<TokenPayload>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse {
                success: false,
                message: Some("Missing payload".to_string()),
            }),
        )
            .into_response();
    };

    let (session_id, fresh) = session_identity(&headers);

    // A value that cannot be a token is indistinguishable from an unknown one.
    let result = if token::valid_format(&payload.token) {
        flow.redeem(&session_id, &payload.token)
    } else {
        Err(RedeemError::NotFound)
    };

    match result {
        Ok(()) => {
            let mut response_headers = HeaderMap::new();
            if fresh {
                if let Ok(cookie) = session_cookie(&session_id) {
                    response_headers.insert(SET_COOKIE, cookie);
                }
            }
            (
                StatusCode::OK,
                response_headers,
                Json(VerifyResponse {
                    success: true,
                    message: None,
                }),
            )
                .into_response()
        }
        Err(err) => {
            let status = match err {
                RedeemError::NotFound => StatusCode::NOT_FOUND,
                RedeemError::AlreadyUsed | RedeemError::Expired => StatusCode::BAD_REQUEST,
            };
            (
                status,
                Json(VerifyResponse {
                    success: false,
                    message: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/verify/session",
    responses(
        (status = 200, description = "Whether the caller holds a verified session", body = SessionStatus),
    ),
    tag = "verify",
)]
#[instrument(skip(flow, headers))]
pub async fn session(
    Extension(flow): Extension<Arc<VerificationFlow>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let verified = extract_cookie(&headers, SESSION_COOKIE_NAME)
        .map_or(false, |session_id| flow.is_verified(&session_id));
    Json(SessionStatus { verified })
}

/// Session identity from the request cookie, or a fresh one to be set on the
/// response.
fn session_identity(headers: &HeaderMap) -> (String, bool) {
    match extract_cookie(headers, SESSION_COOKIE_NAME) {
        Some(session_id) => (session_id, false),
        None => (Uuid::new_v4().to_string(), true),
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        // Flag-style pairs carry no value; keep scanning.
        let Some(val) = parts.next() else {
            continue;
        };
        if key == name {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn session_cookie(session_id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={TOKEN_TTL_SECONDS}"
    );
    HeaderValue::from_str(&cookie)
}
