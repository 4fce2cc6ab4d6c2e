pub mod auth;
pub mod category;
pub mod conversation;
pub mod message;
pub mod user;
pub mod video;
