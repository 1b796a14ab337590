pub mod config;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod import;
pub mod models;
pub mod parser;
pub mod render;
pub mod source;
pub mod store;
pub mod sync;
pub mod tags;
