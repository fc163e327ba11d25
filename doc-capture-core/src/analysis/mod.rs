pub mod iban;
pub mod qr_channel;
pub mod qr_formats;
pub mod text_channel;
