//! Job layer for payreport.
//!
//! Turns parsed [`Settings`](report_core::settings::Settings) into report
//! results by wiring file discovery, readers and aggregators together, with
//! operator input supplied through the [`providers`] traits.

pub mod jobs;
pub mod providers;

pub use report_core as core;
pub use report_data as data;
