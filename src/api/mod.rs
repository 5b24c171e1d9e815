//! API Module
//!
//! HTTP handlers and routing for the image cache REST API.
//!
//! # Endpoints
//! - `GET /image?url=` - Resolve an image through the cache tiers
//! - `PUT /settings` - Queue cache settings changes
//! - `GET /stats` - Get per-tier cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
