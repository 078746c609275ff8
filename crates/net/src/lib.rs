#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Networking for shipit
//!
//! A pooled HTTP client with retry logic, and the resumable download engine
//! that persists response metadata next to partial files so an interrupted
//! transfer picks up where it left off after a crash.

mod client;
mod download;
mod record;

pub use client::{NetClient, NetConfig};
pub use download::{DownloadManager, DownloadedFile};
pub use record::{fingerprint, DownloadRecord};
