pub mod capture_models;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod qr;
pub mod state;
pub mod still_image;
