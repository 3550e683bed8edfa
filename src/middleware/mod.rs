// middleware - steps that run ahead of route handlers
//
// cors - global; computes CORS headers and answers pre-flight requests
// auth - route-level guard; verifies the bearer token with the identity service

pub mod auth;
pub mod cors;

pub use auth::RequireUser;
pub use cors::Cors;
