//! Integration tests for error types

#[cfg(test)]
mod tests {
    use shipit_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://example.com".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_error_display() {
        let err = InstallError::MovingAcrossVolumes {
            src: "/Applications/App.app".into(),
            dest: "/Volumes/USB/App.app".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot move /Applications/App.app to /Volumes/USB/App.app: paths are on different volumes"
        );
    }

    #[test]
    fn test_error_clone() {
        let err = SignatureError::NoDesignatedRequirement {
            path: "/tmp/App.app".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_discriminators_are_stable() {
        let err: Error = SignatureError::DidNotPass {
            path: "/tmp/App.app".into(),
            detail: "invalid signature".into(),
        }
        .into();
        assert_eq!(err.discriminator(), "SignatureDidNotPass");

        let err: Error = StateError::UnknownPhase { value: 42 }.into();
        assert_eq!(err.discriminator(), "UnknownPhase");

        let err: Error = InstallError::MissingInstallationData {
            field: "target_bundle_path".into(),
        }
        .into();
        assert_eq!(err.discriminator(), "MissingInstallationData");
    }

    #[test]
    fn test_transient_classification() {
        let transient: Error = NetworkError::StreamInterrupted { bytes: 1024 }.into();
        assert!(transient.is_transient());

        let fatal: Error = SignatureError::DidNotPass {
            path: "/tmp/App.app".into(),
            detail: "mismatch".into(),
        }
        .into();
        assert!(!fatal.is_transient());

        let fatal: Error = StateError::UnknownPhase { value: 9 }.into();
        assert!(!fatal.is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.is_transient());
    }
}
