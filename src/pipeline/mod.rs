pub mod align;
pub mod export;
pub mod geo;
pub mod merge;
pub mod parse;
pub mod smooth;
pub mod stats;
pub mod summary;
