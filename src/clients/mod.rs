//! Backend clients used by scenarios.
//!
//! The engine sees the backend only through the [`Backend`] trait.

pub mod backend;
pub mod error;
pub mod http_backend;

pub use backend::*;
pub use error::*;
pub use http_backend::*;
