//! Typed external messages exchanged with a backend through a
//! pair of message/property tables.

pub mod config;
pub mod error;
pub mod ingest;
pub mod message;
pub mod reader;
pub mod store;

pub use error::Error;
pub use message::ExternMessage;
pub use reader::MessageReader;
