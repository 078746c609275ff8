#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! The installer state machine
//!
//! Drives a persistent, resumable installation through a totally-ordered
//! sequence of phases. Every transition is recorded durably before the next
//! phase's filesystem work begins, so the daemon can be killed at any point
//! and the next invocation resumes exactly where it stopped. Failure past the
//! retry cap enters recovery, which restores the moved-aside target and
//! verifies it against the signature captured before any mutation.

mod installer;
mod paths;
mod phases;
mod recovery;
pub mod termination;

pub use installer::Installer;
