//! Text output layer for payreport.
//!
//! Renders job results as plain text: headers, aligned listings and the
//! change sections of the traffic and watchlist reports.

pub mod components;
pub mod render;

pub use report_core as core;
