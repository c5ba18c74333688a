//! Parsed PEP 508 requirement strings: `name[extra1,extra2]>=1,<2; python_version >= "3.8"`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use pep440_rs::VersionSpecifiers;

use super::marker::{EnvMarkerExpr, MarkerParseError};
use super::package_name::{PackageName, ParsePackageNameError};

/// An extra name requested alongside a requirement, e.g. the `test` in `foo[test]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Extra(String);

impl Extra {
    /// Returns the extra name as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Extra {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error produced while parsing a requirement string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequirementParseError {
    /// The package name segment was invalid.
    #[error("invalid package name: {0}")]
    Name(#[from] ParsePackageNameError),
    /// The `; marker` segment was invalid.
    #[error("invalid marker expression: {0}")]
    Marker(#[from] MarkerParseError),
    /// The version specifier segment was invalid.
    #[error("invalid version specifier: {0}")]
    Specifier(String),
    /// The string did not match the general requirement grammar at all.
    #[error("malformed requirement string '{0}'")]
    Malformed(String),
}

/// A fully parsed requirement: a package name, an optional extras list, a version specifier
/// set, and an optional environment marker expression.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// The required distribution's name.
    pub name: PackageName,
    /// Extras requested on the distribution, e.g. `requests[socks]`.
    pub extras: Vec<Extra>,
    /// The version specifier set constraining acceptable versions; empty means "any version".
    pub specifiers: VersionSpecifiers,
    /// The marker expression gating whether this requirement applies in the current
    /// environment, if one was present in the source string.
    pub marker: Option<EnvMarkerExpr>,
}

impl Requirement {
    /// Parses a requirement string of the form
    /// `name[extra1,extra2] (specifier) ; marker`.
    pub fn parse(input: &str) -> Result<Self, RequirementParseError> {
        let input = input.trim();

        // Split off the marker clause first; everything after the first top-level `;` is the
        // marker expression, there is never more than one.
        let (body, marker_str) = match input.find(';') {
            Some(idx) => (&input[..idx], Some(input[idx + 1..].trim())),
            None => (input, None),
        };
        let body = body.trim();

        let name_end = body
            .find(|c: char| c == '[' || c == '=' || c == '>' || c == '<' || c == '!' || c == '~' || c.is_whitespace())
            .unwrap_or(body.len());
        let name_str = &body[..name_end];
        if name_str.is_empty() {
            return Err(RequirementParseError::Malformed(input.to_string()));
        }
        let name = PackageName::from_str(name_str)?;

        let mut rest = body[name_end..].trim_start();

        let mut extras = Vec::new();
        if let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped
                .find(']')
                .ok_or_else(|| RequirementParseError::Malformed(input.to_string()))?;
            let extras_str = &stripped[..close];
            for e in extras_str.split(',') {
                let e = e.trim();
                if !e.is_empty() {
                    extras.push(Extra(e.to_string()));
                }
            }
            rest = stripped[close + 1..].trim_start();
        }

        // An optional parenthesized specifier, e.g. `foo (>=1.0)`.
        let specifier_str = if let Some(stripped) = rest.strip_prefix('(') {
            let close = stripped
                .find(')')
                .ok_or_else(|| RequirementParseError::Malformed(input.to_string()))?;
            stripped[..close].trim()
        } else {
            rest.trim()
        };

        let specifiers = if specifier_str.is_empty() {
            VersionSpecifiers::from_str("")
                .map_err(|e| RequirementParseError::Specifier(e.to_string()))?
        } else {
            VersionSpecifiers::from_str(specifier_str)
                .map_err(|e| RequirementParseError::Specifier(e.to_string()))?
        };

        let marker = marker_str
            .filter(|s| !s.is_empty())
            .map(EnvMarkerExpr::parse)
            .transpose()?;

        Ok(Requirement {
            name,
            extras,
            specifiers,
            marker,
        })
    }

    /// Returns true if `version` satisfies every specifier in this requirement.
    pub fn matches_version(&self, version: &pep440_rs::Version) -> bool {
        self.specifiers.contains(version)
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(
                f,
                "[{}]",
                self.extras
                    .iter()
                    .map(Extra::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            )?;
        }
        write!(f, "{}", self.specifiers)?;
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_plain_name() {
        let req = Requirement::parse("requests").unwrap();
        assert_eq!(req.name.as_str(), "requests");
        assert!(req.extras.is_empty());
        assert!(req.marker.is_none());
    }

    #[test]
    fn test_parse_with_extras_and_specifier() {
        let req = Requirement::parse("requests[socks,security]>=2.0,<3.0").unwrap();
        assert_eq!(req.name.as_str(), "requests");
        assert_eq!(req.extras.len(), 2);
        assert_eq!(req.extras[0].as_str(), "socks");
        let version: pep440_rs::Version = "2.5".parse().unwrap();
        assert!(req.matches_version(&version));
        let version: pep440_rs::Version = "3.5".parse().unwrap();
        assert!(!req.matches_version(&version));
    }

    #[test]
    fn test_parse_with_marker() {
        let req =
            Requirement::parse("foo >= 1.0 ; python_version >= \"3.8\" and extra == \"test\"")
                .unwrap();
        assert_eq!(req.name.as_str(), "foo");
        assert!(req.marker.is_some());
    }

    #[test]
    fn test_parse_parenthesized_specifier() {
        let req = Requirement::parse("foo (>=1.0)").unwrap();
        assert_eq!(req.name.as_str(), "foo");
        let version: pep440_rs::Version = "1.1".parse().unwrap();
        assert!(req.matches_version(&version));
    }
}
