use async_trait::async_trait;
use axum::http::StatusCode;

use crate::api::response::{error_body, INTERNAL_ERROR_BODY};
use crate::router::{Flow, Handler, HandlerResult, RequestContext};
use crate::services::ServiceError;

pub use crate::services::AuthUser;

/// Route-level guard: the request must carry a bearer token the identity
/// service accepts. On success the verified user is attached to the context.
pub struct RequireUser;

#[async_trait]
impl Handler for RequireUser {
    async fn call(&self, ctx: &mut RequestContext) -> HandlerResult {
        let Some(token) = ctx.bearer_token().map(str::to_string) else {
            return ctx.respond(StatusCode::UNAUTHORIZED, error_body("Unauthorized"));
        };

        let state = ctx.state.clone();
        match state.identity.get_user(&token).await {
            Ok(user) => {
                tracing::debug!(
                    user_id = %user.id,
                    email = user.email.as_deref().unwrap_or("-"),
                    "Authenticated request"
                );
                ctx.user = Some(user);
                Ok(Flow::Continue)
            }
            Err(err) if rejects_token(&err) => {
                tracing::debug!("Token rejected: {}", err);
                ctx.respond(StatusCode::UNAUTHORIZED, error_body("Unauthorized"))
            }
            Err(err) => {
                tracing::error!("Token verification failed: {}", err);
                ctx.respond(StatusCode::INTERNAL_SERVER_ERROR, error_body(INTERNAL_ERROR_BODY))
            }
        }
    }

    fn name(&self) -> &'static str {
        "require_user"
    }
}

/// The identity service answered and did not vouch for the token
fn rejects_token(err: &ServiceError) -> bool {
    err.is_rejection() || matches!(err, ServiceError::Decode(_))
}
