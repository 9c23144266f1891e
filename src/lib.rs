//! Build note filters from optional criteria and run them against an embedded document store.

pub mod cli;
pub mod collection;
pub mod config;
pub mod connection;
pub mod display;
pub mod document;
pub mod errors;
pub mod filter;
pub mod journal;
pub mod logger;
pub mod note;
pub mod query;
pub mod runner;
pub mod scratch;
pub mod seed;
pub mod trace;
pub mod types;

pub use connection::{Connection, ConnectionUri, connect, with_connection};
pub use document::Model;
pub use errors::DbError;
pub use filter::{FilterBuilder, IdBounds, Pagination};
pub use note::{Note, NoteDraft};
pub use query::{DeleteReport, Filter, FindOptions, Patch, Projection, UpdateReport};
pub use runner::{Operation, QueryResult, QueryRunner, UpdateOptions, UpdateOutcome};
pub use types::{DocumentId, numbered_id, parse_id};
