pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod reporter;
pub mod server;
pub mod state;
pub mod template;
pub mod utils;
pub mod worker;
