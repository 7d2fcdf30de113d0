pub mod qr;
pub mod scripted;

pub use qr::QrBackend;
pub use scripted::ScriptedBackend;
