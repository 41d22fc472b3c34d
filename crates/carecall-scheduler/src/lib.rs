//! # carecall-scheduler
//!
//! Reminder lifecycle for carecall.
//!
//! This crate provides:
//! - [`ReminderEngine`]: every status change, validated against the
//!   reminder state machine and applied through conditional updates
//! - [`DueScanner`]: one sweep that triggers every due reminder
//! - [`SweepWorker`]: optional in-process periodic sweeps
//! - [`ReminderQueries`]: per-user listings
//! - [`ToolBridge`]: tool calls made by the voice session mid-call

pub mod lifecycle;
pub mod queries;
pub mod sweep;
pub mod tools;

pub use lifecycle::ReminderEngine;
pub use queries::ReminderQueries;
pub use sweep::{DueScanner, SweepConfig, SweepEvent, SweepHandle, SweepWorker};
pub use tools::ToolBridge;
