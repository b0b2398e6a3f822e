//! API Routes
//!
//! Route handlers organized by functionality.

pub mod data;
pub mod devices;
pub mod health;
