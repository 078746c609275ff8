//! Code signature error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SignatureError {
    #[error("cannot create static code for {path}: {message}")]
    CannotCreateStaticCode { path: String, message: String },

    #[error("bundle has no designated requirement: {path}")]
    NoDesignatedRequirement { path: String },

    #[error("bundle did not pass signature verification: {path}: {detail}")]
    DidNotPass { path: String, detail: String },

    #[error("stored requirement is not valid UTF-8")]
    MalformedRequirement,
}

impl SignatureError {
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::CannotCreateStaticCode { .. } => "CannotCreateStaticCode",
            Self::NoDesignatedRequirement { .. } => "NoDesignatedRequirement",
            Self::DidNotPass { .. } => "SignatureDidNotPass",
            Self::MalformedRequirement => "MalformedRequirement",
        }
    }
}
