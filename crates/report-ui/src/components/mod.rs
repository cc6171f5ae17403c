//! Reusable text building blocks shared by the report renderers.

pub mod header;
pub mod layout;
