pub mod authorization;
pub mod capture_hardware;
pub mod orientation;
pub mod text_recognizer;
