//! Data layer for payreport.
//!
//! Discovers and decodes export files (CSV in legacy encodings or
//! spreadsheets), normalizes them into tables and computes the tallies and
//! comparisons behind each report.

pub mod aggregator;
pub mod export;
pub mod reader;
pub mod table;
pub mod traffic;
pub mod watchlist;

pub use report_core as core;
