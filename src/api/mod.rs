//! HTTP surface of the relay: shared state, handlers, and the route table.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
