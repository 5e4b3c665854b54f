pub mod assert;
pub mod data_types;
pub mod fetch_utils;
pub mod merkle;
