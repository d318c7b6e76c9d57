pub mod artifacts;
pub mod associations;
pub mod commands;
pub mod sites;
