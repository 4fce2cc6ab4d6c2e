pub mod database;
pub mod media;
pub mod memory;
