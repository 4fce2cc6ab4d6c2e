pub mod auth_service;
pub mod category_service;
pub mod gateway;
pub mod health_service;
pub mod message_service;
pub mod rate_limit_service;
pub mod repository;
pub mod user_service;
pub mod video_service;
