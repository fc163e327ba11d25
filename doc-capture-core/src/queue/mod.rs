pub mod delivery;
pub mod frame_queue;
pub mod serial_queue;
