pub mod audit;
pub mod connector;
pub mod db;
