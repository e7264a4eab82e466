pub mod auth;
pub mod error;
pub mod middleware;
pub mod movies;
pub mod mutations;
pub mod reviews;
pub mod routes;
pub mod users;

pub use routes::router;
