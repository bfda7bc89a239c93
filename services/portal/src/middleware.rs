//! Session-cookie authentication middleware

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{AppState, error::PortalError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "auth_session";

/// Phone number of the authenticated parent, inserted into request
/// extensions for the handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedPhone(pub String);

/// Validate the session cookie and expose the verified phone to the
/// handler chain
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, PortalError> {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default();

    let phone = state
        .session_store
        .validate(&session_id)
        .await
        .ok_or(PortalError::Unauthorized)?;

    req.extensions_mut().insert(AuthenticatedPhone(phone));

    Ok(next.run(req).await)
}
