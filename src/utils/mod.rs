//! The `utils` module provides the shared plumbing used across `courier`:
//! the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{MessagingError, Result};

#[cfg(test)]
mod tests;
