pub mod auth;
pub mod connector;
pub mod events;
pub mod fleet;
pub mod health;
pub mod sites;
