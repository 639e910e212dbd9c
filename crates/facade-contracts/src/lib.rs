pub mod asset;
pub mod commands;
pub mod errors;
pub mod events;
pub mod history;
pub mod models;
pub mod providers;
pub mod results;
pub mod styles;
