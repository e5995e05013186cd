//! Remote data service surface for BizConnect.
//!
//! The hosted relational store is the sole source of truth for every table;
//! the application only ever holds derived copies. This crate defines the
//! table rows, the [`DataService`] contract (CRUD per table plus a changefeed
//! subscription) and a SQLite-backed implementation used as the reference
//! service and by the integration tests.

pub mod error;
pub mod event;
pub mod rows;
pub mod service;
pub mod sqlite;

pub use error::{Error, Result};
pub use event::{Change, Event};
pub use service::DataService;
pub use sqlite::SqliteService;
