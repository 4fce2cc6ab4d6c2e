pub mod message;
pub mod user;
pub mod video;

pub use message::MessageRecord;
pub use user::UserRecord;
pub use video::{CategoryRecord, VideoRecord};
