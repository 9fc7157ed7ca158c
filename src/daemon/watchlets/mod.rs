//! Built-in watchlets

pub mod clock;
