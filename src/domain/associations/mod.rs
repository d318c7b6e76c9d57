pub mod association;
