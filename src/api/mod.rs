//! Webhook server: signal intake plus the manual control endpoints.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
