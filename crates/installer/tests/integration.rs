//! Integration tests for the installer state machine
//!
//! Bundles here are plain directories carrying an Info.plist and a signature
//! marker file; the verifier compares markers instead of driving codesign,
//! which keeps every scenario runnable on any host. Crash scenarios are
//! staged by writing the exact state record and filesystem layout a killed
//! daemon would leave behind, then running the installer against them.

use async_trait::async_trait;
use shipit_config::{Config, DirectoryManager};
use shipit_errors::{Error, SignatureError, StateError};
use shipit_installer::Installer;
use shipit_signature::RequirementVerifier;
use shipit_state::StateStore;
use shipit_types::{CodeSignature, InstallerPhase, InstallerState, OwnedBundle, UpdateRequest};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Verifier that treats `Contents/_signature` as the bundle's identity.
struct MarkerVerifier;

#[async_trait]
impl RequirementVerifier for MarkerVerifier {
    async fn capture(&self, bundle_path: &Path) -> Result<CodeSignature, Error> {
        match tokio::fs::read(bundle_path.join("Contents/_signature")).await {
            Ok(bytes) => Ok(CodeSignature::from_requirement(bytes)),
            Err(_) => Err(SignatureError::NoDesignatedRequirement {
                path: bundle_path.display().to_string(),
            }
            .into()),
        }
    }

    async fn verify(&self, signature: &CodeSignature, bundle_path: &Path) -> Result<(), Error> {
        let bytes = tokio::fs::read(bundle_path.join("Contents/_signature"))
            .await
            .map_err(|e| SignatureError::CannotCreateStaticCode {
                path: bundle_path.display().to_string(),
                message: e.to_string(),
            })?;
        if bytes == signature.requirement() {
            Ok(())
        } else {
            Err(SignatureError::DidNotPass {
                path: bundle_path.display().to_string(),
                detail: "signature marker mismatch".into(),
            }
            .into())
        }
    }
}

/// Verifier whose capture fails transiently a fixed number of times.
struct FlakyCaptureVerifier {
    inner: MarkerVerifier,
    failures_remaining: AtomicU32,
}

#[async_trait]
impl RequirementVerifier for FlakyCaptureVerifier {
    async fn capture(&self, bundle_path: &Path) -> Result<CodeSignature, Error> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "flaky").into());
        }
        self.inner.capture(bundle_path).await
    }

    async fn verify(&self, signature: &CodeSignature, bundle_path: &Path) -> Result<(), Error> {
        self.inner.verify(signature, bundle_path).await
    }
}

struct Harness {
    _root: TempDir,
    apps_dir: PathBuf,
    store: StateStore,
    target: PathBuf,
    update: PathBuf,
}

impl Harness {
    async fn new() -> Self {
        let root = TempDir::new().unwrap();
        let apps_dir = root.path().join("Applications");
        tokio::fs::create_dir_all(&apps_dir).await.unwrap();

        let dirs = DirectoryManager::new("com.example.TestApp", root.path().join("state-root"));
        let store = StateStore::new(dirs);

        let target = apps_dir.join("App.app");
        let update = root.path().join("Update.app");

        Self {
            _root: root,
            apps_dir,
            store,
            target,
            update,
        }
    }

    fn installer(&self) -> Installer {
        Installer::new(
            self.store.clone(),
            Arc::new(MarkerVerifier),
            Config::default(),
        )
    }

    fn request(&self) -> UpdateRequest {
        UpdateRequest::new(&self.update, &self.target)
    }

    fn backup_path(&self) -> PathBuf {
        self.apps_dir.join(".App.app.shipit-backup")
    }

    fn aside_path(&self) -> PathBuf {
        self.apps_dir.join(".App.app.shipit-old")
    }
}

async fn make_bundle(path: &Path, version: &str, signer: &str) {
    tokio::fs::create_dir_all(path.join("Contents/MacOS"))
        .await
        .unwrap();
    let info = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>CFBundleIdentifier</key>
	<string>com.example.TestApp</string>
	<key>CFBundleVersion</key>
	<string>{version}</string>
</dict>
</plist>
"#
    );
    tokio::fs::write(path.join("Contents/Info.plist"), info)
        .await
        .unwrap();
    tokio::fs::write(path.join("Contents/_signature"), signer)
        .await
        .unwrap();
    tokio::fs::write(path.join("Contents/MacOS/App"), format!("binary-{version}"))
        .await
        .unwrap();
}

async fn bundle_version(path: &Path) -> String {
    let info = tokio::fs::read_to_string(path.join("Contents/Info.plist"))
        .await
        .unwrap();
    let start = info.find("<key>CFBundleVersion</key>").unwrap();
    let rest = &info[start..];
    let vstart = rest.find("<string>").unwrap() + "<string>".len();
    let vend = rest.find("</string>").unwrap();
    rest[vstart..vend].to_string()
}

#[tokio::test]
async fn happy_path_installs_update_and_cleans_up() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;
    make_bundle(&h.update, "1.1", "key-K").await;

    h.installer().install(h.request()).await.unwrap();

    assert_eq!(bundle_version(&h.target).await, "1.1");
    assert!(!h.update.exists());
    assert!(!h.backup_path().exists());
    assert!(!h.aside_path().exists());
    assert!(h.store.load_state().await.unwrap().is_none());
    assert!(h.store.load_request().await.unwrap().is_none());
}

#[tokio::test]
async fn substitution_attack_is_rejected_without_touching_target() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;
    make_bundle(&h.update, "1.1", "key-EVIL").await;

    let err = h.installer().install(h.request()).await.unwrap_err();
    assert_eq!(err.discriminator(), "SignatureDidNotPass");

    // Target untouched, records cleared.
    assert_eq!(bundle_version(&h.target).await, "1.0");
    assert!(!h.backup_path().exists());
    assert!(h.store.load_state().await.unwrap().is_none());
    assert!(h.store.load_request().await.unwrap().is_none());
}

#[tokio::test]
async fn resumes_after_crash_between_the_two_swap_moves() {
    let h = Harness::new().await;
    make_bundle(&h.update, "1.1", "key-K").await;

    // The layout a daemon killed mid-Installing leaves behind: target moved
    // aside, update not yet moved in, backup in place, state at Installing.
    make_bundle(&h.aside_path(), "1.0", "key-K").await;
    make_bundle(&h.backup_path(), "1.0", "key-K").await;

    let signature = CodeSignature::from_requirement(b"key-K".to_vec());
    let mut state = InstallerState::from_request(h.request());
    state.code_signature = Some(signature.clone());
    state.owned_target = Some(OwnedBundle {
        original_path: h.target.clone(),
        temporary_path: h.backup_path(),
        code_signature: signature,
    });
    state.backup_path = Some(h.backup_path());
    state.enter_phase(InstallerPhase::Installing);
    h.store.write_state(&state).await.unwrap();

    h.installer().install(h.request()).await.unwrap();

    assert_eq!(bundle_version(&h.target).await, "1.1");
    assert!(!h.aside_path().exists());
    assert!(!h.backup_path().exists());
    assert!(h.store.load_state().await.unwrap().is_none());
}

#[tokio::test]
async fn failed_in_place_verification_restores_the_backup() {
    let h = Harness::new().await;

    // Crash after the swap: the bundle now at the target path is corrupt
    // (wrong signer), the update is gone, the backup holds the original.
    make_bundle(&h.target, "1.1", "key-TAMPERED").await;
    make_bundle(&h.backup_path(), "1.0", "key-K").await;

    let signature = CodeSignature::from_requirement(b"key-K".to_vec());
    let mut state = InstallerState::from_request(h.request());
    state.code_signature = Some(signature.clone());
    state.owned_target = Some(OwnedBundle {
        original_path: h.target.clone(),
        temporary_path: h.backup_path(),
        code_signature: signature,
    });
    state.backup_path = Some(h.backup_path());
    state.enter_phase(InstallerPhase::VerifyingInPlace);
    h.store.write_state(&state).await.unwrap();

    let err = h.installer().install(h.request()).await.unwrap_err();
    assert_eq!(err.discriminator(), "SignatureDidNotPass");

    // The original is back and satisfies the stored signature.
    assert_eq!(bundle_version(&h.target).await, "1.0");
    let restored_sig = tokio::fs::read(h.target.join("Contents/_signature"))
        .await
        .unwrap();
    assert_eq!(restored_sig, b"key-K");
    assert!(h.store.load_state().await.unwrap().is_none());
}

#[tokio::test]
async fn reuses_backup_that_still_verifies() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;
    make_bundle(&h.update, "1.1", "key-K").await;
    make_bundle(&h.backup_path(), "1.0", "key-K").await;

    let (tx, mut rx) = shipit_events::channel();
    let installer = Installer::new(
        h.store.clone(),
        Arc::new(MarkerVerifier),
        Config::default(),
    )
    .with_events(tx);

    installer.install(h.request()).await.unwrap();

    let mut reused = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(
            event,
            shipit_events::AppEvent::Install(shipit_events::InstallEvent::BackupReused { .. })
        ) {
            reused = true;
        }
    }
    assert!(reused);
    assert_eq!(bundle_version(&h.target).await, "1.1");
}

#[tokio::test]
async fn transient_failures_retry_up_to_the_cap() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;
    make_bundle(&h.update, "1.1", "key-K").await;

    // Two transient failures fit inside the cap of three attempts.
    let verifier = Arc::new(FlakyCaptureVerifier {
        inner: MarkerVerifier,
        failures_remaining: AtomicU32::new(2),
    });
    let installer = Installer::new(h.store.clone(), verifier, Config::default());
    installer.install(h.request()).await.unwrap();
    assert_eq!(bundle_version(&h.target).await, "1.1");
}

#[tokio::test]
async fn transient_failures_past_the_cap_abort() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;
    make_bundle(&h.update, "1.1", "key-K").await;

    let verifier = Arc::new(FlakyCaptureVerifier {
        inner: MarkerVerifier,
        failures_remaining: AtomicU32::new(u32::MAX),
    });
    let installer = Installer::new(h.store.clone(), verifier, Config::default());
    let err = installer.install(h.request()).await.unwrap_err();
    assert!(err.is_transient());

    // Nothing was mutated; records are gone.
    assert_eq!(bundle_version(&h.target).await, "1.0");
    assert!(h.store.load_state().await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_phase_in_state_record_is_refused() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;
    make_bundle(&h.update, "1.1", "key-K").await;

    // Hand-write a state record with a phase value from the future.
    let state_file = h.store.directories().state_file();
    tokio::fs::create_dir_all(state_file.parent().unwrap())
        .await
        .unwrap();
    let record = serde_json::json!({
        "version": 1,
        "record": {
            "update_bundle_path": h.update,
            "target_bundle_path": h.target,
            "bundle_identifier": null,
            "relaunch_after_install": false,
            "use_update_bundle_name": false,
            "phase": 42,
            "attempts_in_phase": 0,
            "code_signature": null,
            "owned_target": null,
            "backup_path": null,
        }
    });
    tokio::fs::write(&state_file, serde_json::to_vec(&record).unwrap())
        .await
        .unwrap();

    let err = h.installer().install(h.request()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::State(StateError::RecordCorrupted { .. })
    ));

    // Refusal, not fall-through: the record survives untouched.
    assert!(state_file.exists());
    assert_eq!(bundle_version(&h.target).await, "1.0");
}

#[tokio::test]
async fn update_keeps_its_own_name_when_requested() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;

    let update = h._root.path().join("Renamed.app");
    make_bundle(&update, "2.0", "key-K").await;

    let mut request = UpdateRequest::new(&update, &h.target);
    request.use_update_bundle_name = true;
    h.installer().install(request).await.unwrap();

    let installed = h.apps_dir.join("Renamed.app");
    assert_eq!(bundle_version(&installed).await, "2.0");
    assert!(!h.target.exists());
}

#[tokio::test]
async fn abort_restores_missing_original_from_backup() {
    let h = Harness::new().await;
    make_bundle(&h.backup_path(), "1.0", "key-K").await;

    let signature = CodeSignature::from_requirement(b"key-K".to_vec());
    let mut state = InstallerState::from_request(h.request());
    state.code_signature = Some(signature.clone());
    state.owned_target = Some(OwnedBundle {
        original_path: h.target.clone(),
        temporary_path: h.backup_path(),
        code_signature: signature,
    });
    state.enter_phase(InstallerPhase::Installing);
    h.store.write_state(&state).await.unwrap();

    h.installer().abort().await.unwrap();

    assert_eq!(bundle_version(&h.target).await, "1.0");
    assert!(h.store.load_state().await.unwrap().is_none());
    assert!(h.store.load_request().await.unwrap().is_none());
}

#[tokio::test]
async fn abort_with_nothing_restorable_reports_target_lost() {
    let h = Harness::new().await;

    // No backup, no aside, no original: the bundle is gone.
    let signature = CodeSignature::from_requirement(b"key-K".to_vec());
    let mut state = InstallerState::from_request(h.request());
    state.code_signature = Some(signature.clone());
    state.owned_target = Some(OwnedBundle {
        original_path: h.target.clone(),
        temporary_path: h.backup_path(),
        code_signature: signature,
    });
    state.enter_phase(InstallerPhase::Installing);
    h.store.write_state(&state).await.unwrap();

    let err = h.installer().abort().await.unwrap_err();
    assert_eq!(err.discriminator(), "TargetLost");

    // Forensic state stays on disk.
    assert!(h.store.load_state().await.unwrap().is_some());
}

#[tokio::test]
async fn run_pending_reports_no_work() {
    let h = Harness::new().await;
    assert!(!h.installer().run_pending().await.unwrap());
}

#[tokio::test]
async fn run_pending_picks_up_a_submitted_request() {
    let h = Harness::new().await;
    make_bundle(&h.target, "1.0", "key-K").await;
    make_bundle(&h.update, "1.1", "key-K").await;

    h.store.submit_request(&h.request()).await.unwrap();
    assert!(h.installer().run_pending().await.unwrap());
    assert_eq!(bundle_version(&h.target).await, "1.1");
}
