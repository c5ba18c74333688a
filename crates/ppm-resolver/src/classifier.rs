//! Classifies raw index listing records into [`Artifact`]s: a filename either parses as a wheel
//! or sdist under the naming convention, or the record is discarded.

use crate::env::HostEnvironment;
use crate::index_client::IndexRecord;
use crate::types::{Artifact, ArtifactName, NormalizedPackageName};

/// Classifies one raw listing record into an [`Artifact`], ranking a wheel's tag set against
/// `env` and recording whichever tag ranked best. Returns `None` if the filename doesn't match
/// the wheel or sdist naming convention, or if its version segment isn't valid PEP 440 — both
/// of which are silent discards rather than hard errors, per §4.3.
pub fn classify(record: &IndexRecord, name: &NormalizedPackageName, env: &HostEnvironment) -> Option<Artifact> {
    let parsed = ArtifactName::from_filename(&record.filename, name).ok()?;

    let matched_tag = match &parsed {
        ArtifactName::Wheel(wheel) => env.tags().best_match(wheel.all_tags_iter()).map(|(tag, _)| tag),
        ArtifactName::SDist(_) => None,
    };

    Some(Artifact {
        name: parsed,
        url: record.url.clone(),
        sha256: record.sha256_hint.clone(),
        matched_tag,
    })
}

/// Classifies every record in `records`, discarding anything that fails to classify.
pub fn classify_all(
    records: &[IndexRecord],
    name: &NormalizedPackageName,
    env: &HostEnvironment,
) -> Vec<Artifact> {
    records.iter().filter_map(|r| classify(r, name, env)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::DEFAULT_CPYTHON_MINOR;

    fn record(filename: &str) -> IndexRecord {
        IndexRecord {
            url: format!("https://pypi.org/simple/trio/{filename}").parse().unwrap(),
            filename: filename.to_string(),
            sha256_hint: String::new(),
        }
    }

    #[test]
    fn test_classifies_wheel() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let name: NormalizedPackageName = "trio".parse().unwrap();
        let artifact = classify(&record("trio-0.18.0-py3-none-any.whl"), &name, &env).unwrap();
        assert!(artifact.is_wheel());
        assert!(artifact.matched_tag.is_some());
    }

    #[test]
    fn test_classifies_sdist() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let name: NormalizedPackageName = "trio".parse().unwrap();
        let artifact = classify(&record("trio-0.18.0.tar.gz"), &name, &env).unwrap();
        assert!(!artifact.is_wheel());
        assert!(artifact.matched_tag.is_none());
    }

    #[test]
    fn test_discards_unrecognized_extension() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let name: NormalizedPackageName = "trio".parse().unwrap();
        assert!(classify(&record("trio-0.18.0.exe"), &name, &env).is_none());
    }

    #[test]
    fn test_wheel_with_no_matching_tag_has_null_triple() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let name: NormalizedPackageName = "trio".parse().unwrap();
        let artifact = classify(
            &record("trio-0.18.0-cp27-cp27m-win32.whl"),
            &name,
            &env,
        )
        .unwrap();
        assert!(artifact.is_wheel());
        assert!(artifact.matched_tag.is_none());
    }
}
