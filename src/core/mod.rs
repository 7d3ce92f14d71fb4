pub mod config;
pub mod guard;
pub mod session;
pub mod state;
