//! # bibup Common Library
//!
//! Shared code for the bibup metadata-update services including:
//! - Record and row snapshot model (what observers see)
//! - Event types (UpdateEvent enum) and the broadcast EventBus
//! - TOML configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use model::{Creator, FieldDiff, FieldValue, ItemId, QueueProgress, Record, RowSnapshot, RowStatus};
