#![forbid(unsafe_code)]

//! Core domain model and business logic for the Ropelog session tracker.
//!
//! This crate provides:
//! - Domain types (sessions, segments, timer state, actions)
//! - The segment ledger and server-side timer derivation
//! - The session state machine and service layer
//! - Persistence (locked JSON documents, JSONL archive, CSV export)
//! - Client-side predictive countdown and inactivity detection

pub mod archive;
pub mod config;
pub mod countdown;
pub mod error;
pub mod idle;
pub mod ledger;
pub mod logging;
pub mod service;
pub mod store;
pub mod summary;
pub mod timer;
pub mod types;

// Re-export commonly used types
pub use archive::{read_archived, JsonlArchive, SessionSink};
pub use config::Config;
pub use countdown::Countdown;
pub use error::{Error, Result};
pub use idle::IdleMonitor;
pub use service::SessionService;
pub use store::SessionStore;
pub use summary::SummaryStore;
pub use types::*;
