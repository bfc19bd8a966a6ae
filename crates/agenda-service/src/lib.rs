//! Agenda module lifecycle.
//!
//! [`start`] performs one eager refresh and render, then hands control to a
//! [`RefreshScheduler`] running on its own task until the returned
//! [`ModuleHandle`] is stopped.

pub mod module;
pub mod scheduler;

pub use module::{start, start_with_defaults, ModuleHandle};
pub use scheduler::{RefreshScheduler, SchedulerSettings, SchedulerState, SchedulerStats};
