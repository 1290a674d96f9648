pub mod cli;
pub mod core;
pub mod domain;
pub mod infra;

pub use crate::core::session::{Request, Response, Session};
pub use crate::domain::config::WorkspaceConfig;
