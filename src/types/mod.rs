pub mod activity;
pub mod comparison;
