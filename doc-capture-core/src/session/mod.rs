pub mod controller;
pub mod device_session;
pub mod still_capturer;
