//! Same-origin chat proxy: accepts chat history on `POST /api/chat`,
//! forwards it to an OpenAI-compatible provider and streams the reply back
//! in the line-prefixed protocol understood by `threadline-client`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod provider;
pub mod routes;
pub mod state;

pub use routes::build_router;
