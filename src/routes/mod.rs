pub mod compare;
pub mod health;
pub mod merge;
pub mod session;
pub mod upload;
