//! The installer drive loop

use crate::{paths, phases, recovery, termination};
use shipit_config::Config;
use shipit_errors::Result;
use shipit_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use shipit_signature::RequirementVerifier;
use shipit_state::StateStore;
use shipit_types::{InstallerPhase, InstallerState, UpdateRequest};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Performs the installation of an update, resuming from the state record on
/// disk when one exists.
///
/// The caller is responsible for holding the single-instance lock; nothing in
/// here may run twice concurrently for one application.
pub struct Installer {
    pub(crate) store: StateStore,
    pub(crate) verifier: Arc<dyn RequirementVerifier>,
    pub(crate) config: Config,
    tx: Option<EventSender>,
}

impl EventEmitter for Installer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl Installer {
    #[must_use]
    pub fn new(store: StateStore, verifier: Arc<dyn RequirementVerifier>, config: Config) -> Self {
        Self {
            store,
            verifier,
            config,
            tx: None,
        }
    }

    /// Attach an event sender for progress reporting.
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Daemon entry point: pick up whatever work is on disk.
    ///
    /// An in-progress state record wins over a pending request. Returns
    /// `false` when there is nothing to do.
    ///
    /// # Errors
    ///
    /// Propagates installation failures; see [`Installer::install`].
    pub async fn run_pending(&self) -> Result<bool> {
        if let Some(state) = self.store.load_state().await? {
            info!(phase = state.phase.name(), "resuming in-progress installation");
            self.install(state.request.clone()).await?;
            return Ok(true);
        }
        if let Some(request) = self.store.load_request().await? {
            info!(bundle = %request.target_bundle_path.display(), "starting requested installation");
            self.install(request).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Install the update described by `request`, or resume an in-progress
    /// installation.
    ///
    /// Every phase transition is written durably before the next phase's
    /// filesystem work begins. Transient errors retry the phase up to the
    /// configured cap; anything else aborts, restoring the original target
    /// where necessary.
    ///
    /// # Errors
    ///
    /// The error that stopped the installation; `TargetLost` if recovery
    /// itself failed to restore a verifiable bundle.
    pub async fn install(&self, request: UpdateRequest) -> Result<()> {
        request.validate()?;

        let mut state = match self.store.load_state().await? {
            Some(state) => {
                if state.request != request {
                    // The state record is exclusively ours; a divergent
                    // request file cannot preempt an in-progress install.
                    warn!("pending request differs from in-progress state; resuming state");
                }
                state
            }
            None => InstallerState::from_request(request),
        };

        if state.phase == InstallerPhase::Idle {
            // A terminal record that escaped cleanup; finish the cleanup.
            self.finalize(&state).await?;
            return Ok(());
        }

        // The phase about to run must be on disk before its work starts.
        self.store.write_state(&state).await?;

        termination::wait_for_termination(
            &self.config,
            self.store.directories(),
            &state.request,
            self.event_sender(),
        )
        .await?;

        let run_id = Uuid::new_v4();
        self.emit(AppEvent::Install(InstallEvent::Started {
            run_id,
            target_bundle_path: state.request.target_bundle_path.clone(),
        }));

        loop {
            self.emit(AppEvent::Install(InstallEvent::PhaseStarted {
                run_id,
                phase: state.phase,
                attempt: state.attempts_in_phase,
            }));

            match self.run_phase(&mut state).await {
                Ok(()) => {
                    self.emit(AppEvent::Install(InstallEvent::PhaseCompleted {
                        run_id,
                        phase: state.phase,
                    }));

                    if state.phase == InstallerPhase::Relaunching {
                        let installed = paths::installed_path(&state);
                        self.finalize(&state).await?;
                        info!(installed = %installed.display(), "installation complete");
                        self.emit(AppEvent::Install(InstallEvent::Completed {
                            run_id,
                            installed_path: installed,
                        }));
                        return Ok(());
                    }

                    state.enter_phase(state.phase.next());
                    self.store.write_state(&state).await?;
                }
                Err(e) => {
                    let transient = e.is_transient();
                    if transient {
                        state.record_attempt();
                        if state.attempts_in_phase < self.config.installer.phase_attempt_cap {
                            warn!(
                                phase = state.phase.name(),
                                attempt = state.attempts_in_phase,
                                error = %e,
                                "phase failed, retrying"
                            );
                            self.emit(AppEvent::Install(InstallEvent::PhaseFailed {
                                run_id,
                                phase: state.phase,
                                error: e.to_string(),
                                will_retry: true,
                            }));
                            self.store.write_state(&state).await?;
                            continue;
                        }
                    }

                    self.emit(AppEvent::Install(InstallEvent::PhaseFailed {
                        run_id,
                        phase: state.phase,
                        error: e.to_string(),
                        will_retry: false,
                    }));

                    if transient {
                        warn!(
                            phase = state.phase.name(),
                            attempts = state.attempts_in_phase,
                            "attempt cap exhausted, aborting"
                        );
                    }

                    recovery::abort(self, &state).await?;
                    self.emit(AppEvent::Install(InstallEvent::Aborted {
                        run_id,
                        error: e.to_string(),
                    }));
                    return Err(e);
                }
            }
        }
    }

    /// Abort entry point: restore the target if needed and clear all records.
    ///
    /// Must not be invoked while an install is executing.
    ///
    /// # Errors
    ///
    /// `TargetLost` if no verifiable bundle could be restored; records are
    /// then left on disk for inspection.
    pub async fn abort(&self) -> Result<()> {
        match self.store.load_state().await? {
            Some(state) => recovery::abort(self, &state).await,
            None => {
                // Nothing in progress; drop a pending request if present.
                self.store.clear_request().await
            }
        }
    }

    async fn run_phase(&self, state: &mut InstallerState) -> Result<()> {
        match state.phase {
            InstallerPhase::Idle => Ok(()),
            InstallerPhase::ReadingSignature => phases::read_signature(self, state).await,
            InstallerPhase::VerifyingUpdate => phases::verify_update(self, state).await,
            InstallerPhase::ClearingQuarantine => {
                phases::clear_quarantine(self, state).await;
                Ok(())
            }
            InstallerPhase::BackingUp => phases::back_up(self, state).await,
            InstallerPhase::Installing => phases::install_swap(state).await,
            InstallerPhase::VerifyingInPlace => phases::verify_in_place(self, state).await,
            InstallerPhase::Relaunching => {
                phases::relaunch(self, state).await;
                Ok(())
            }
        }
    }

    /// Terminal cleanup: the install succeeded, nothing on disk should
    /// suggest otherwise.
    async fn finalize(&self, state: &InstallerState) -> Result<()> {
        use shipit_platform::fs as pfs;

        if let Some(backup) = &state.backup_path {
            pfs::remove_dir_all_if_exists(backup).await?;
        }
        pfs::remove_dir_all_if_exists(&paths::aside_path(&state.request.target_bundle_path))
            .await?;

        // A copied (rather than moved) update bundle is still around; it has
        // served its purpose.
        if paths::installed_path(state) != state.request.update_bundle_path {
            pfs::remove_dir_all_if_exists(&state.request.update_bundle_path).await?;
        }

        self.store.clear_request().await?;
        self.store.clear_state().await?;
        pfs::remove_file_if_exists(&self.store.directories().sentinel_file()).await?;
        Ok(())
    }
}
