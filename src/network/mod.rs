//! Unix socket transport for sound requests

pub mod client;
pub mod server;

pub use client::send_request;
pub use server::SoundServer;
