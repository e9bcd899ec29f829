//! HTTP surface for clickgate.
//!
//! Serves `GET /verify/:identifier`. Each visit is handed to the
//! [`WaiterRegistry`](clickgate_registry::WaiterRegistry), which decides the
//! outcome and wakes the caller waiting on that identifier. The response
//! status tells the visitor what happened:
//!
//! | result            | status |
//! |-------------------|--------|
//! | fulfilled         | 200    |
//! | timed out         | 410    |
//! | blocked           | 403    |
//! | nothing pending   | 401    |
//!
//! [`VerifyServer::serve`] owns a listener (plain TCP or TLS);
//! [`VerifyServer::router`] returns the routes alone for embedding into a
//! host application.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod render;
pub mod server;
pub mod shutdown;

pub use config::{RenderKind, ServerConfig};
pub use error::{ConfigError, ServerError};
pub use render::{HtmlRender, JsonRender, Render, ResponseBody};
pub use server::VerifyServer;
pub use shutdown::ShutdownController;
