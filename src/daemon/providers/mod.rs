//! Built-in notification providers

pub mod weather_file;
