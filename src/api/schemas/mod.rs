pub mod auth;
pub mod categories;
pub mod health;
pub mod messages;
pub mod users;
pub mod videos;
