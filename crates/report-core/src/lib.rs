pub mod change;
pub mod error;
pub mod formatting;
pub mod models;
pub mod numbers;
pub mod profile;
pub mod schema;
pub mod settings;
pub mod time_utils;
