//! Changed-file selection and per-file diff retrieval.

pub mod fetch;
pub mod filter;
