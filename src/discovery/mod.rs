pub mod candidates;
pub mod constants;
pub mod controller;
pub mod host;
pub mod machine;
pub mod timer;
pub mod types;
