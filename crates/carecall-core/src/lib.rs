//! # carecall-core
//!
//! Core types, traits, and abstractions for the carecall reminder platform.
//!
//! This crate provides the reminder data model, the authoritative status
//! state machine, the error taxonomy, and the trait seams (store, clock,
//! call dispatch, family notification, vitals) that the other carecall
//! crates depend on.

pub mod clock;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod temporal;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use models::*;
pub use temporal::{format_timestamp, parse_timestamp};
pub use traits::*;
pub use uuid_utils::new_v7;
