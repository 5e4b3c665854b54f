pub mod ballot;

pub use ballot::*;
