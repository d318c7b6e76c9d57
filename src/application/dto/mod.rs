pub mod associations;
pub mod sync;
