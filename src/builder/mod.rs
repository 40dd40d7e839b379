//! Builder API for state declarations.
//!
//! Declarations are plain data; [`StateBuilder`] assembles them fluently and
//! [`RegistrationError`] reports what registration rejects.

pub mod error;
pub mod state;

pub use error::RegistrationError;
pub use state::StateBuilder;
