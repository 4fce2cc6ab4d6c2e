pub mod room_gc;

pub use room_gc::RoomGcWorker;
