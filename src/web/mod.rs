//! HTTP gateway: axum router, session gate, and wire types.

pub mod auth;
pub mod server;
pub mod types;

pub use auth::{AuthState, BearerTokenVerifier, RemoteSessionVerifier, SessionVerifier};
pub use server::{GatewayState, build_router, start_server};
