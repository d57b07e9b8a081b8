//! Result formatting.

pub mod console;
