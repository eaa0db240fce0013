//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the mix, download and status endpoints
//! - Multipart upload intake into per-request scratch directories
//! - Request logging and CORS middleware

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod upload;

pub use routes::create_router;
