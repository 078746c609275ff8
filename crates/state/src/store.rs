//! Request and installer-state record lifecycle

use crate::{envelope, RECORD_VERSION};
use shipit_config::DirectoryManager;
use shipit_errors::{Error, StateError};
use shipit_types::{InstallerState, UpdateRequest};
use tracing::debug;

/// Reads and writes the request and state records for one application.
///
/// Ownership is asymmetric: client processes may only create a request while
/// no state record exists; the daemon owns both records for the duration of
/// an install.
#[derive(Debug, Clone)]
pub struct StateStore {
    dirs: DirectoryManager,
}

impl StateStore {
    #[must_use]
    pub fn new(dirs: DirectoryManager) -> Self {
        Self { dirs }
    }

    #[must_use]
    pub fn directories(&self) -> &DirectoryManager {
        &self.dirs
    }

    /// Client entry point: validate and persist a new update request.
    ///
    /// # Errors
    ///
    /// Refuses with `AlreadyLocked`-adjacent semantics if an install is in
    /// progress (a state record exists); also fails on an invalid request.
    pub async fn submit_request(&self, request: &UpdateRequest) -> Result<(), Error> {
        request.validate()?;

        if self.load_state().await?.is_some() {
            return Err(StateError::RecordCorrupted {
                path: self.dirs.state_file().display().to_string(),
                message: "an installation is already in progress".into(),
            }
            .into());
        }

        self.dirs.ensure_directories().await?;
        envelope::write_record(&self.dirs.request_file(), RECORD_VERSION, request).await?;
        debug!(path = %self.dirs.request_file().display(), "request written");
        Ok(())
    }

    /// Load the pending request, if any.
    ///
    /// # Errors
    ///
    /// Propagates corruption and version refusals; absence is `None`.
    pub async fn load_request(&self) -> Result<Option<UpdateRequest>, Error> {
        match envelope::read_record(&self.dirs.request_file(), RECORD_VERSION).await {
            Ok(request) => Ok(Some(request)),
            Err(Error::State(StateError::RecordMissing { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load the in-progress installer state, if any.
    ///
    /// # Errors
    ///
    /// Propagates corruption and version refusals; absence is `None`.
    pub async fn load_state(&self) -> Result<Option<InstallerState>, Error> {
        match envelope::read_record(&self.dirs.state_file(), RECORD_VERSION).await {
            Ok(state) => Ok(Some(state)),
            Err(Error::State(StateError::RecordMissing { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Durably record the installer state.
    ///
    /// This write is the serialization point of the state machine: it must
    /// complete before the filesystem work of the phase it records begins.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_state(&self, state: &InstallerState) -> Result<(), Error> {
        self.dirs.ensure_directories().await?;
        envelope::write_record(&self.dirs.state_file(), RECORD_VERSION, state).await
    }

    /// Remove the state record.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails for a reason other than absence.
    pub async fn clear_state(&self) -> Result<(), Error> {
        envelope::remove_record(&self.dirs.state_file()).await
    }

    /// Remove the request record.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails for a reason other than absence.
    pub async fn clear_request(&self) -> Result<(), Error> {
        envelope::remove_record(&self.dirs.request_file()).await
    }
}
