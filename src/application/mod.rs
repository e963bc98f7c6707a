//! Application services: range resolution and error presentation.

pub mod error;
pub mod ranges;
