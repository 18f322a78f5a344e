pub mod client;
pub mod client_impl;
pub mod factory;
pub mod models;
pub mod prompts;
