use utoipa::OpenApi;

use super::handlers::{health, verify};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        verify::start,
        verify::check_access,
        verify::redeem,
        verify::session,
    ),
    components(schemas(
        verify::TokenPayload,
        verify::VerifyResponse,
        verify::SessionStatus,
    )),
    tags(
        (name = "verify", description = "Single-use token verification flow"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
