pub mod adaptors;
pub mod auth;
pub mod category;
pub mod chain;
pub mod failure;
pub mod postings;
pub mod settlement;
pub mod store;
