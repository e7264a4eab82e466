pub mod cache;
pub mod connection;
pub mod dispatcher;
pub mod identity;
pub mod intent;
