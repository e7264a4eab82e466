pub mod api;
pub mod events;
pub mod links;
pub mod models;
pub mod rating;
