//! WebAPI - read endpoints and request gates
//!
//! ## Responsibilities
//!
//! - The two image endpoints (`/random_image`, `/image_get/:alias`)
//! - The rate-limit and HTTPS-enforcement gates ahead of dispatch
//! - Response formatting (binary on success, JSON on every failure)

mod middleware;
mod routes;

pub use routes::create_router;
