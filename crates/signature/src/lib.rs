#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Code-signature capture and verification
//!
//! The trust root of the whole installer is the designated requirement of the
//! original target bundle: it is captured once, before any mutation, persisted
//! into the installer state, and every later verification (update, in-place,
//! recovery) tests candidate bundles against that stored requirement.

mod codesign;

pub use codesign::CodesignVerifier;

use async_trait::async_trait;
use shipit_errors::Error;
use shipit_types::CodeSignature;
use std::path::Path;

/// Capture and test designated requirements.
///
/// The production implementation drives the platform `codesign` tool; tests
/// substitute their own.
#[async_trait]
pub trait RequirementVerifier: Send + Sync {
    /// Extract the designated requirement from the bundle's signature
    /// metadata and serialize it for persistence.
    ///
    /// # Errors
    ///
    /// `NoDesignatedRequirement` for an unsigned bundle,
    /// `CannotCreateStaticCode` when the bundle cannot be opened as code.
    async fn capture(&self, bundle_path: &Path) -> Result<CodeSignature, Error>;

    /// Confirm the bundle at `bundle_path` satisfies `signature`, recursively
    /// validating embedded signed resources.
    ///
    /// Verification is path-independent: the bundle may have moved since the
    /// requirement was captured.
    ///
    /// # Errors
    ///
    /// `DidNotPass` when the bundle does not satisfy the requirement,
    /// `CannotCreateStaticCode` when it cannot be opened as code.
    async fn verify(&self, signature: &CodeSignature, bundle_path: &Path) -> Result<(), Error>;
}
