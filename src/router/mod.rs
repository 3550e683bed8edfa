// Request router and middleware-chain dispatcher
//
// path      - segment-wise template matching and parameter extraction
// context   - per-request mutable state
// handler   - the step contract shared by middleware and route handlers
// table     - route registration and the immutable route table
// dispatch  - the request state machine and its axum binding

pub mod context;
pub mod dispatch;
pub mod handler;
pub mod path;
pub mod table;

pub use context::RequestContext;
pub use dispatch::{into_service, Dispatcher};
pub use handler::{handler_fn, BoxHandler, Flow, Handler, HandlerResult};
pub use path::{extract_params, matches, Params};
pub use table::{Route, RouteTable, Router};
