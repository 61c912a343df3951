// Downloader backends

pub mod http;

pub use http::{HttpBackend, SseChannel};
