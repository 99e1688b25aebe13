//! Persistence layer: the message gateway trait and its libSQL backend.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlGateway;
pub use traits::{MessageGateway, MessageQuery, MessageRow};
