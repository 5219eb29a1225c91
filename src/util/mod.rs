//! Various utilities

pub(crate) mod cache;
