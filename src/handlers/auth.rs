// handlers/auth.rs - /api/auth/* handlers
//
// register, login and logout are public; current_user runs behind RequireUser.

use axum::http::StatusCode;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;

use crate::api::response::error_body;
use crate::error::ApiError;
use crate::router::{HandlerResult, RequestContext};

use super::{non_empty, rejection_message};

const DEFAULT_REDIRECT_ORIGIN: &str = "http://localhost:8787";

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl Credentials {
    fn required(self) -> Result<(String, String, Option<String>), ApiError> {
        match (non_empty(self.email), non_empty(self.password)) {
            (Some(email), Some(password)) => Ok((email, password, non_empty(self.name))),
            _ => Err(ApiError::bad_request("Email and password are required")),
        }
    }
}

/**
 * POST /api/auth/register - Create an account with the identity service
 *
 * Input: `{ "email": "...", "password": "...", "name": "..." }`
 *
 * Output (201): `{ "message", "user", "token" }`. `token` is null when the
 * identity service holds the account for email confirmation and the
 * follow-up sign-in is refused.
 */
pub fn register(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let (email, password, name) = ctx.json::<Credentials>()?.required()?;
        let state = ctx.state.clone();

        let origin = ctx.header("origin").unwrap_or(DEFAULT_REDIRECT_ORIGIN);
        let redirect_to = format!("{}/auth/callback", origin.trim_end_matches('/'));

        let session = match state
            .identity
            .sign_up(&email, &password, name.as_deref(), &redirect_to)
            .await
        {
            Ok(session) => session,
            Err(err) => match rejection_message(&err) {
                Some(message) => {
                    tracing::info!("Registration refused: {}", message);
                    return ctx.respond(StatusCode::BAD_REQUEST, error_body(message));
                }
                None => return Err(err.into()),
            },
        };

        let token = match session.access_token {
            Some(token) => Some(token),
            None => match state.identity.sign_in_with_password(&email, &password).await {
                Ok(signed_in) => signed_in.access_token,
                Err(err) => {
                    tracing::warn!("Sign-in after registration failed: {}", err);
                    None
                }
            },
        };

        ctx.respond(
            StatusCode::CREATED,
            json!({
                "message": "Registration successful",
                "user": session.user,
                "token": token
            }),
        )
    })
}

/// POST /api/auth/login - Exchange email + password for an access token
pub fn login(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let (email, password, _) = ctx.json::<Credentials>()?.required()?;
        let state = ctx.state.clone();

        match state.identity.sign_in_with_password(&email, &password).await {
            Ok(session) => {
                let Some(token) = session.access_token else {
                    tracing::error!("Sign-in succeeded without an access token");
                    return Err(ApiError::bad_gateway("Upstream service returned an invalid response"));
                };
                ctx.respond(
                    StatusCode::OK,
                    json!({
                        "message": "Login successful",
                        "user": session.user,
                        "token": token
                    }),
                )
            }
            Err(err) => match rejection_message(&err) {
                Some(message) => ctx.respond(StatusCode::UNAUTHORIZED, error_body(message)),
                None => Err(err.into()),
            },
        }
    })
}

/// POST /api/auth/logout - Revoke the session named by the bearer token
pub fn logout(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let Some(token) = ctx.bearer_token().map(str::to_string) else {
            return Err(ApiError::bad_request("Token is required in Authorization header"));
        };
        let state = ctx.state.clone();

        match state.identity.sign_out(&token).await {
            Ok(()) => ctx.respond(StatusCode::OK, json!({ "message": "Logout successful" })),
            Err(err) => match rejection_message(&err) {
                Some(message) => ctx.respond(StatusCode::BAD_REQUEST, error_body(message)),
                None => Err(err.into()),
            },
        }
    })
}

/// GET /api/auth/user - The verified principal, as the identity service describes it
pub fn current_user(ctx: &mut RequestContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user = ctx.user()?.raw.clone();
        ctx.respond(StatusCode::OK, json!({ "user": user }))
    })
}
