pub mod config;
pub mod section;
pub mod snippet;
pub mod store;
