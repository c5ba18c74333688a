//! Core data types for working with a PyPI-compatible packaging index. Follows PEP 503
//! (normalized names), PEP 427/PyPA (wheel/sdist filename conventions), and PEP 508 (requirement
//! and marker syntax) as closely as possible.

mod artifact;
mod artifact_name;
pub mod marker;
mod package_name;
mod requirement;

pub use artifact::Artifact;

pub use artifact_name::{
    ArtifactName, BuildTag, ParseArtifactNameError, SDistFilename, SDistFormat, WheelFilename,
};

pub use package_name::{NormalizedPackageName, PackageName, ParsePackageNameError};

pub use requirement::{Extra, Requirement, RequirementParseError};

pub use marker::{EnvMarkerExpr, MarkerParseError};

pub use pep440_rs::{Version, VersionSpecifier, VersionSpecifiers};
