pub mod file_system;
pub mod logger;
pub mod output;
pub mod server;
