pub mod application;
pub mod host;
pub mod style;
pub mod types;
