//! The core module holds the backend seam descriptor management is built on, and the error type.

pub mod device;
pub mod error;
pub mod traits;
