//! Client-side derivations over backend data.

pub mod error;
pub mod loyalty;
pub mod schedule;

pub use error::DomainError;
