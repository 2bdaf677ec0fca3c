// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {crate::package_version::VersionError, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {0}: {1}")]
    IoPath(String, std::io::Error),

    #[error("ar archive parse error: {0}")]
    ParseAr(String),

    #[error("tar archive parse error: {0}")]
    ParseTar(String),

    #[error("control file parse error: {0}")]
    ParseControl(String),

    #[error("unknown compression in archive member: {0}")]
    UnknownCompression(String),

    #[error("unsupported debian-binary version: {0}")]
    UnsupportedDebianBinary(String),

    #[error("no control file in control archive")]
    MissingControl,

    #[error("required control field missing or empty: {0}")]
    MissingRequiredField(&'static str),

    #[error("invalid {0} name '{1}': must match [a-z-]+")]
    InvalidName(&'static str, String),

    #[error("unexpected entry in input tree: {0}")]
    UnexpectedEntry(String),

    #[error("duplicate package {package}_{version}_{architecture} in {dist}/{component}")]
    DuplicatePackage {
        dist: String,
        component: String,
        package: String,
        version: String,
        architecture: String,
    },

    #[error("output root already exists: {0}")]
    OutputExists(String),

    #[error("could not load signing key: {0}")]
    KeyLoad(String),

    #[error("signing operation failed: {0:?}")]
    Sign(pgp::errors::Error),

    #[error("version string error: {0}")]
    Version(#[from] VersionError),

    #[error("repository phase '{0}' requires phase '{1}' to have completed")]
    PhaseOrder(&'static str, &'static str),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, RepositoryError>;
