//! Recorder session lifecycle
//!
//! This module provides the `Recorder` abstraction that manages:
//! - Session identity allocation
//! - Command sequencing against a recording engine (prepare, record, pause, stop, destroy)
//! - Reconciliation of engine events with in-flight commands
//! - Observable state and a per-session notification stream

mod factory;
mod identity;
mod options;
mod recorder;
mod state;

pub use factory::RecorderFactory;
pub use identity::{IdentityAllocator, SessionId};
pub use options::{Quality, RecorderOptions};
pub use recorder::{Recorder, RecorderEvent};
pub use state::RecorderState;
