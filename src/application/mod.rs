pub mod access;
pub mod diff;
pub mod dto;
pub mod ports;
pub mod services;
pub mod use_cases;
