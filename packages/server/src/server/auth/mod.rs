// Request authentication extractors
pub mod extractors;

pub use extractors::*;
