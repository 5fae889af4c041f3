//! Type definitions for Stashed.

pub mod errors;
pub mod message;
pub mod save;
pub mod session;
pub mod tag;
