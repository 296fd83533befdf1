//! API routes and handlers

pub mod completions;
pub mod conversations;
pub mod internal;
mod router;

pub use router::create_router;
