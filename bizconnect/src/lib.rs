//! Client engine for a founders' network: a local mirror of the hosted data
//! service, kept live by reconciling changefeed events and by optimistic
//! application of the user's own writes.

pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod loader;
pub mod model;
pub mod mutate;
pub mod notify;
pub mod reconcile;
pub mod session;
pub mod state;

pub use app::App;
pub use mutate::{Confirmation, MutationError, MutationResult};
pub use state::{AppState, OpenChat, Store};
