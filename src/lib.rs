pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod services;

pub use config::AppConfig;
pub use error::ApiError;
pub use routes::{app, router};
pub use services::AppState;
