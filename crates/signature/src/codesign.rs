//! `codesign`-backed requirement verifier

use crate::RequirementVerifier;
use async_trait::async_trait;
use shipit_errors::{Error, SignatureError};
use shipit_types::CodeSignature;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

const DESIGNATED_PREFIX: &str = "designated => ";

/// Verifier backed by the platform `codesign` tool.
#[derive(Debug, Clone, Default)]
pub struct CodesignVerifier {
    _private: (),
}

impl CodesignVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequirementVerifier for CodesignVerifier {
    async fn capture(&self, bundle_path: &Path) -> Result<CodeSignature, Error> {
        let output = Command::new("codesign")
            .arg("--display")
            .arg("-r-")
            .arg(bundle_path)
            .output()
            .await
            .map_err(|e| SignatureError::CannotCreateStaticCode {
                path: bundle_path.display().to_string(),
                message: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            if stderr.contains("not signed") {
                return Err(SignatureError::NoDesignatedRequirement {
                    path: bundle_path.display().to_string(),
                }
                .into());
            }
            return Err(SignatureError::CannotCreateStaticCode {
                path: bundle_path.display().to_string(),
                message: stderr.trim().to_string(),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let requirement = parse_designated_requirement(&stdout).ok_or_else(|| {
            SignatureError::NoDesignatedRequirement {
                path: bundle_path.display().to_string(),
            }
        })?;

        debug!(bundle = %bundle_path.display(), "captured designated requirement");
        Ok(CodeSignature::from_requirement(requirement.into_bytes()))
    }

    async fn verify(&self, signature: &CodeSignature, bundle_path: &Path) -> Result<(), Error> {
        let requirement = std::str::from_utf8(signature.requirement())
            .map_err(|_| SignatureError::MalformedRequirement)?;

        let output = Command::new("codesign")
            .arg("--verify")
            .arg("--deep")
            .arg("--strict")
            .arg(format!("-R={requirement}"))
            .arg(bundle_path)
            .output()
            .await
            .map_err(|e| SignatureError::CannotCreateStaticCode {
                path: bundle_path.display().to_string(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            debug!(bundle = %bundle_path.display(), "bundle satisfies stored requirement");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such file") {
            return Err(SignatureError::CannotCreateStaticCode {
                path: bundle_path.display().to_string(),
                message: stderr.trim().to_string(),
            }
            .into());
        }

        Err(SignatureError::DidNotPass {
            path: bundle_path.display().to_string(),
            detail: stderr.trim().to_string(),
        }
        .into())
    }
}

/// Extract the designated requirement from `codesign --display -r-` output.
///
/// The requirement set is one requirement per line, each prefixed by its tag.
fn parse_designated_requirement(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix(DESIGNATED_PREFIX)
            .map(|req| req.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_designated_line() {
        let output = "designated => identifier \"com.example.App\" and anchor apple generic\n";
        assert_eq!(
            parse_designated_requirement(output).unwrap(),
            "identifier \"com.example.App\" and anchor apple generic"
        );
    }

    #[test]
    fn picks_designated_among_other_tags() {
        let output = "host => anchor apple\ndesignated => identifier \"com.example.App\"\n";
        assert_eq!(
            parse_designated_requirement(output).unwrap(),
            "identifier \"com.example.App\""
        );
    }

    #[test]
    fn no_designated_line_is_none() {
        assert!(parse_designated_requirement("host => anchor apple\n").is_none());
        assert!(parse_designated_requirement("").is_none());
    }

    // Exercises the real codesign tool; only meaningful on a macOS host with
    // a signed system application present.
    #[tokio::test]
    #[ignore]
    #[cfg(target_os = "macos")]
    async fn captures_and_verifies_a_system_bundle() {
        let verifier = CodesignVerifier::new();
        let bundle = Path::new("/System/Applications/Calculator.app");
        let signature = verifier.capture(bundle).await.unwrap();
        verifier.verify(&signature, bundle).await.unwrap();
    }
}
