pub mod artifact;
pub mod listing;
