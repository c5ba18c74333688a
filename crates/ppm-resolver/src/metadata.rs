//! Extracts `Requires-Dist` lines from a downloaded wheel's `*.dist-info/METADATA` file.
//!
//! Reading is synchronous and in-memory (`zip::ZipArchive::by_name`) rather than the streaming,
//! range-request based approach a reference implementation uses to fetch just the metadata over
//! HTTP without downloading the whole wheel — by the time this component runs, the whole wheel
//! is already on disk in the cache, so there is nothing to stream.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::types::{PackageName, Version};

/// Failure extracting `Requires-Dist` lines from a wheel.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The archive could not be opened as a zip file.
    #[error("not a valid zip archive: {0}")]
    InvalidZip(#[from] zip::result::ZipError),
    /// No `<name>-<version>.dist-info/` directory was found at the top level.
    #[error("no .dist-info directory found for {0} {1}")]
    DistInfoNotFound(PackageName, Version),
    /// The `.dist-info/METADATA` entry itself could not be read.
    #[error("failed to read METADATA: {0}")]
    MetadataUnreadable(std::io::Error),
}

/// Reads the raw `Requires-Dist:` header values (including any trailing `; marker` clause) out
/// of a wheel's METADATA file. Each returned string is exactly what followed the colon,
/// trimmed, with RFC822-style folded continuation lines joined back onto one line.
pub fn requires_dist(wheel_bytes: &[u8], name: &PackageName, version: &Version) -> Result<Vec<String>, MetadataError> {
    let mut archive = ZipArchive::new(Cursor::new(wheel_bytes))?;

    let dist_info_dir = find_dist_info_dir(&mut archive, name, version)?;
    let metadata_path = format!("{dist_info_dir}/METADATA");

    let mut bytes = Vec::new();
    archive
        .by_name(&metadata_path)
        .map_err(MetadataError::InvalidZip)?
        .read_to_end(&mut bytes)
        .map_err(MetadataError::MetadataUnreadable)?;

    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_requires_dist(&text))
}

fn find_dist_info_dir<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &PackageName,
    version: &Version,
) -> Result<String, MetadataError> {
    for i in 0..archive.len() {
        let entry_name = archive
            .by_index(i)
            .map_err(MetadataError::InvalidZip)?
            .name()
            .to_string();
        if let Some(top_level) = entry_name.split('/').next() {
            if let Some(candidate) = top_level.strip_suffix(".dist-info") {
                if let Some((candidate_name, candidate_version)) = candidate.rsplit_once('-') {
                    if let (Ok(candidate_name), Ok(candidate_version)) = (
                        candidate_name.parse::<PackageName>(),
                        candidate_version.parse::<Version>(),
                    ) {
                        if &candidate_name == name && &candidate_version == version {
                            return Ok(top_level.to_string());
                        }
                    }
                }
            }
        }
    }
    Err(MetadataError::DistInfoNotFound(name.clone(), version.clone()))
}

/// A minimal RFC822-ish line scanner: joins folded continuation lines (lines starting with
/// whitespace continue the previous header) and collects every `Requires-Dist:` value.
fn parse_requires_dist(text: &str) -> Vec<String> {
    let mut requires = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some(buf) = current.as_mut() {
                buf.push(' ');
                buf.push_str(line.trim());
            }
            continue;
        }

        if let Some(buf) = current.take() {
            requires.push(buf);
        }

        if let Some(rest) = line
            .strip_prefix("Requires-Dist:")
            .or_else(|| line.strip_prefix("Requires-Dist :"))
        {
            current = Some(rest.trim().to_string());
        }
    }
    if let Some(buf) = current.take() {
        requires.push(buf);
    }

    requires
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_wheel(metadata: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            writer
                .start_file("trio-0.18.0.dist-info/METADATA", FileOptions::default())
                .unwrap();
            writer.write_all(metadata.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_extracts_simple_requires_dist() {
        let metadata = "Metadata-Version: 2.1\nName: trio\nVersion: 0.18.0\nRequires-Dist: attrs (>=19.2.0)\nRequires-Dist: sortedcontainers\n";
        let wheel = build_wheel(metadata);
        let name = "trio".parse().unwrap();
        let version = "0.18.0".parse().unwrap();
        let requires = requires_dist(&wheel, &name, &version).unwrap();
        assert_eq!(requires, vec!["attrs (>=19.2.0)", "sortedcontainers"]);
    }

    #[test]
    fn test_joins_folded_continuation_line() {
        let metadata = "Name: trio\nVersion: 0.18.0\nRequires-Dist: foo (>=1.0)\n ; python_version >= \"3.8\"\n";
        let wheel = build_wheel(metadata);
        let name = "trio".parse().unwrap();
        let version = "0.18.0".parse().unwrap();
        let requires = requires_dist(&wheel, &name, &version).unwrap();
        assert_eq!(requires, vec!["foo (>=1.0) ; python_version >= \"3.8\""]);
    }

    #[test]
    fn test_missing_dist_info_is_an_error() {
        let wheel = build_wheel("Name: trio\nVersion: 0.18.0\n");
        let name = "trio".parse().unwrap();
        let version = "0.19.0".parse().unwrap();
        assert!(requires_dist(&wheel, &name, &version).is_err());
    }
}
