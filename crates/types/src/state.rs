//! Installer phases and the persisted installer state record

use crate::request::UpdateRequest;
use crate::signature::CodeSignature;
use serde::{Deserialize, Serialize};
use shipit_errors::StateError;
use std::path::PathBuf;

/// One step of the installer state machine.
///
/// Serialized as its integer value. The numbering is historical and
/// deliberately out of execution order: a newer daemon must resume in-progress
/// installs recorded by an older one, so these values must never be renumbered
/// or have their meaning reused. The canonical execution order is that of
/// [`InstallerPhase::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum InstallerPhase {
    /// No installation is in progress.
    Idle = 0,
    /// Removing the quarantine attribute from the update bundle.
    ClearingQuarantine = 1,
    /// Copying the target bundle aside so it can be restored on failure.
    BackingUp = 2,
    /// Replacing the target bundle with the update bundle.
    Installing = 3,
    /// Verifying that the installed bundle is still valid after the swap.
    VerifyingInPlace = 4,
    /// Reading the designated requirement from the target bundle, so we know
    /// what any update must satisfy.
    ReadingSignature = 5,
    /// Checking that the update bundle meets the requirement captured from
    /// the target bundle.
    VerifyingUpdate = 6,
    /// Launching the installed bundle in the active user session.
    Relaunching = 7,
}

impl InstallerPhase {
    /// The phase that follows the receiver in canonical execution order.
    ///
    /// `Relaunching` completes back to `Idle`; `Idle` begins an install at
    /// `ReadingSignature`.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::ReadingSignature,
            Self::ReadingSignature => Self::VerifyingUpdate,
            Self::VerifyingUpdate => Self::ClearingQuarantine,
            Self::ClearingQuarantine => Self::BackingUp,
            Self::BackingUp => Self::Installing,
            Self::Installing => Self::VerifyingInPlace,
            Self::VerifyingInPlace => Self::Relaunching,
            Self::Relaunching => Self::Idle,
        }
    }

    /// Stable name used in events and log lines.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ClearingQuarantine => "ClearingQuarantine",
            Self::BackingUp => "BackingUp",
            Self::Installing => "Installing",
            Self::VerifyingInPlace => "VerifyingInPlace",
            Self::ReadingSignature => "ReadingSignature",
            Self::VerifyingUpdate => "VerifyingUpdate",
            Self::Relaunching => "Relaunching",
        }
    }
}

impl TryFrom<i64> for InstallerPhase {
    type Error = StateError;

    fn try_from(value: i64) -> Result<Self, StateError> {
        match value {
            0 => Ok(Self::Idle),
            1 => Ok(Self::ClearingQuarantine),
            2 => Ok(Self::BackingUp),
            3 => Ok(Self::Installing),
            4 => Ok(Self::VerifyingInPlace),
            5 => Ok(Self::ReadingSignature),
            6 => Ok(Self::VerifyingUpdate),
            7 => Ok(Self::Relaunching),
            value => Err(StateError::UnknownPhase { value }),
        }
    }
}

impl From<InstallerPhase> for i64 {
    fn from(phase: InstallerPhase) -> i64 {
        phase as i64
    }
}

/// Original and temporary locations of a bundle that has been moved aside.
///
/// Created and persisted before the target is moved, so that recovery can
/// restore the bundle and check it against the signature it had at its
/// original location, irrespective of where it currently resides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedBundle {
    /// Where the bundle resided, and should be restored to on failure.
    pub original_path: PathBuf,

    /// Where the bundle was moved, so another bundle can take its place.
    pub temporary_path: PathBuf,

    /// The signature the bundle at `original_path` must still satisfy after
    /// restoration.
    pub code_signature: CodeSignature,
}

/// Everything the installer daemon needs to resume an installation.
///
/// Mutated only by the daemon; written durably before the filesystem work of
/// each phase begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerState {
    #[serde(flatten)]
    pub request: UpdateRequest,

    /// The phase currently being executed (or about to be).
    pub phase: InstallerPhase,

    /// Attempts made within the current phase. Reset to zero on every
    /// successful transition.
    pub attempts_in_phase: u32,

    /// The designated requirement captured from the original target bundle
    /// during `ReadingSignature`.
    pub code_signature: Option<CodeSignature>,

    /// Set once the target has been moved aside during installation.
    pub owned_target: Option<OwnedBundle>,

    /// Directory the target was copied to prior to the swap. Set during
    /// `BackingUp`, cleared at finalization.
    pub backup_path: Option<PathBuf>,
}

impl InstallerState {
    /// Begin a fresh installation for `request`, entering the first active
    /// phase.
    #[must_use]
    pub fn from_request(request: UpdateRequest) -> Self {
        Self {
            request,
            phase: InstallerPhase::ReadingSignature,
            attempts_in_phase: 0,
            code_signature: None,
            owned_target: None,
            backup_path: None,
        }
    }

    /// Record a successful transition into `phase`, resetting the attempt
    /// counter.
    pub fn enter_phase(&mut self, phase: InstallerPhase) {
        self.phase = phase;
        self.attempts_in_phase = 0;
    }

    /// Record another attempt at the current phase.
    pub fn record_attempt(&mut self) {
        self.attempts_in_phase += 1;
    }
}
