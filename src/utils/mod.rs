// src/utils/mod.rs
pub mod retry;

pub use retry::{RetryPolicy, Retrying};
