pub mod merkle;
pub mod snapshot;
pub mod utils;

pub use merkle::*;
pub use snapshot::*;
