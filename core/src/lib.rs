pub mod api;
pub mod auth;
pub mod config;
pub mod model;
pub mod notify;
pub mod session;
pub mod tree;
