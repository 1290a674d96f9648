pub mod change_sync;
pub mod context_generator;
pub mod file_operations;
pub mod ignore_rules;
pub mod payload_parser;
pub mod selection_tree;
pub mod session;
