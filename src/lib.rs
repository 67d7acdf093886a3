//! Bookstore service library
//!
//! The book catalog module plus the bootstrap that wires it into the kernel,
//! the database and the HTTP server.

pub mod app;
pub mod modules;
