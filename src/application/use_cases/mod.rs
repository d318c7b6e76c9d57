pub mod associations;
pub mod commands;
pub mod sync;
