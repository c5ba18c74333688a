//! Deterministic lock output emission (§5, §6): `lock.json`, `pylock.toml`,
//! `matrix_inputs.txt`, `matrix_plan.json`, and the standalone dependency-free verifier source
//! file.
//!
//! Every writer here sorts its input first; none of them rely on the resolved map's insertion
//! (commit) order, matching §9's "lock determinism must be enforced at emission time" note.

use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::ResolverConfig;
use crate::env::HostEnvironment;
use crate::error::ResolveError;
use crate::resolver::ResolvedPackage;
use crate::tags::CompatTag;
use crate::types::NormalizedPackageName;

/// Writes every output described in §6 under `config.root`, in the order: `lock.json`,
/// `pylock.toml`, `matrix_inputs.txt`, `matrix_plan.json`, `verify.rs`.
pub fn write_all(
    config: &ResolverConfig,
    env: &HostEnvironment,
    resolved: &IndexMap<NormalizedPackageName, ResolvedPackage>,
) -> Result<(), ResolveError> {
    let ppm_dir = config.ppm_dir();
    std::fs::create_dir_all(&ppm_dir)
        .map_err(|e| ResolveError::OutputWrite(ppm_dir.display().to_string(), e))?;

    let packages = sorted_packages(resolved);

    write_lock_json(config, &ppm_dir, &packages)?;
    write_pylock_toml(config, env, &packages)?;
    write_matrix_inputs(&ppm_dir, &packages)?;
    write_matrix_plan(config, &ppm_dir)?;
    write_verifier(env, &ppm_dir, &packages)?;

    Ok(())
}

/// Recovers the CPython feature-version minor number (e.g. `11` for "3.11") from the
/// environment's `python_version` marker value, for embedding into the generated verifier,
/// which cannot depend on [`crate::env`] to synthesize its own `cp3XX` tag.
fn cpython_minor(env: &HostEnvironment) -> u32 {
    env.get("python_version")
        .rsplit('.')
        .next()
        .and_then(|minor| minor.parse().ok())
        .unwrap_or(crate::env::DEFAULT_CPYTHON_MINOR)
}

/// Every resolved package, sorted ascending by canonical name (§5: "the emitted lock is sorted
/// lexicographically by canonical name at write time").
fn sorted_packages(resolved: &IndexMap<NormalizedPackageName, ResolvedPackage>) -> Vec<&ResolvedPackage> {
    let mut packages: Vec<&ResolvedPackage> = resolved.values().collect();
    packages.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
    packages
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<(), ResolveError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| ResolveError::OutputWrite(path.display().to_string(), std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    std::fs::write(path, body).map_err(|e| ResolveError::OutputWrite(path.display().to_string(), e))
}

// ---------------------------------------------------------------------------------------------
// .ppm/lock.json
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LockDocument {
    version: u32,
    indexes: LockIndexes,
    packages: Vec<LockPackage>,
}

#[derive(Debug, Serialize)]
struct LockIndexes {
    primary: String,
    extra: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LockPackage {
    name: String,
    version: String,
    markers: Option<String>,
    artifacts: Vec<LockArtifact>,
}

#[derive(Debug, Serialize)]
struct LockArtifact {
    filename: String,
    url: String,
    sha256: String,
    version: String,
    py_tag: Option<String>,
    abi_tag: Option<String>,
    plat_tag: Option<String>,
    is_wheel: bool,
}

impl From<&ResolvedPackage> for LockPackage {
    fn from(package: &ResolvedPackage) -> Self {
        let artifact = &package.artifact;
        let (py_tag, abi_tag, plat_tag) = match &artifact.matched_tag {
            Some(CompatTag { interpreter, abi, platform }) => {
                (Some(interpreter.clone()), Some(abi.clone()), Some(platform.clone()))
            }
            None => (None, None, None),
        };

        LockPackage {
            name: package.name.as_str().to_string(),
            version: package.version.to_string(),
            markers: if package.marker.is_empty() { None } else { Some(package.marker.clone()) },
            // Exactly one chosen artifact per package in this MVP (§3); the array is kept as
            // the on-disk shape so a future multi-artifact lock does not need a schema break.
            artifacts: vec![LockArtifact {
                filename: artifact.filename(),
                url: artifact.url.to_string(),
                sha256: artifact.sha256.clone(),
                version: artifact.version().to_string(),
                py_tag,
                abi_tag,
                plat_tag,
                is_wheel: artifact.is_wheel(),
            }],
        }
    }
}

fn write_lock_json(config: &ResolverConfig, ppm_dir: &Path, packages: &[&ResolvedPackage]) -> Result<(), ResolveError> {
    let doc = LockDocument {
        version: 1,
        indexes: LockIndexes {
            primary: config.index_url.to_string(),
            extra: config.extra_index_urls.iter().map(ToString::to_string).collect(),
        },
        packages: packages.iter().map(|p| LockPackage::from(*p)).collect(),
    };
    write_json(&ppm_dir.join("lock.json"), &doc)
}

// ---------------------------------------------------------------------------------------------
// pylock.toml
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PylockDocument {
    lock: PylockLock,
    environment: PylockEnvironment,
    packages: Vec<PylockPackage>,
}

#[derive(Debug, Serialize)]
struct PylockLock {
    version: String,
}

#[derive(Debug, Serialize)]
struct PylockEnvironment {
    python: String,
}

#[derive(Debug, Serialize)]
struct PylockSource {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct PylockPackage {
    name: String,
    version: String,
    source: PylockSource,
    artifacts: Vec<String>,
    hashes: Vec<String>,
    markers: String,
}

impl From<&ResolvedPackage> for PylockPackage {
    fn from(package: &ResolvedPackage) -> Self {
        let artifact = &package.artifact;
        let hashes = if artifact.sha256.is_empty() {
            Vec::new()
        } else {
            vec![format!("sha256:{}", artifact.sha256)]
        };
        PylockPackage {
            name: package.name.as_str().to_string(),
            version: package.version.to_string(),
            source: PylockSource { kind: "pypi".to_string() },
            artifacts: vec![artifact.filename()],
            hashes,
            markers: package.marker.clone(),
        }
    }
}

fn write_pylock_toml(config: &ResolverConfig, env: &HostEnvironment, packages: &[&ResolvedPackage]) -> Result<(), ResolveError> {
    let doc = PylockDocument {
        lock: PylockLock { version: "1.0".to_string() },
        environment: PylockEnvironment { python: env.get("python_full_version") },
        packages: packages.iter().map(|p| PylockPackage::from(*p)).collect(),
    };
    let body = toml::to_string_pretty(&doc)
        .map_err(|e| ResolveError::OutputWrite("pylock.toml".to_string(), std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    let path = config.root.join("pylock.toml");
    std::fs::write(&path, body).map_err(|e| ResolveError::OutputWrite(path.display().to_string(), e))
}

// ---------------------------------------------------------------------------------------------
// .ppm/matrix_inputs.txt
// ---------------------------------------------------------------------------------------------

fn write_matrix_inputs(ppm_dir: &Path, packages: &[&ResolvedPackage]) -> Result<(), ResolveError> {
    let mut body = String::new();
    for package in packages {
        let artifact = &package.artifact;
        if artifact.sha256.is_empty() {
            continue;
        }
        writeln!(body, "{}\t{}", artifact.filename(), artifact.sha256).ok();
    }
    let path = ppm_dir.join("matrix_inputs.txt");
    std::fs::write(&path, body).map_err(|e| ResolveError::OutputWrite(path.display().to_string(), e))
}

// ---------------------------------------------------------------------------------------------
// .ppm/matrix_plan.json
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MatrixPlan {
    platform: String,
}

/// The accelerator platforms recognized by substring match against configured index URLs,
/// first match wins (§9's open-question resolution: preserve the original's heuristic exactly
/// rather than re-deriving a "more correct" scheme).
const ACCELERATOR_PLATFORMS: &[&str] = &["cu118", "cu126", "cu128", "rocm63"];

/// Classifies the resolve pass's accelerator platform from substring matches against every
/// configured index URL, in declaration order; defaults to `cpu` if nothing matches.
pub fn classify_matrix_platform(config: &ResolverConfig) -> String {
    let urls: Vec<String> = config.indexes().map(ToString::to_string).collect();
    for candidate in ACCELERATOR_PLATFORMS {
        if urls.iter().any(|url| url.contains(candidate)) {
            tracing::debug!(platform = candidate, "matrix platform classified by index URL substring");
            return candidate.to_string();
        }
    }
    tracing::debug!(platform = "cpu", "no accelerator substring matched any index URL, defaulting to cpu");
    "cpu".to_string()
}

fn write_matrix_plan(config: &ResolverConfig, ppm_dir: &Path) -> Result<(), ResolveError> {
    let plan = MatrixPlan { platform: classify_matrix_platform(config) };
    write_json(&ppm_dir.join("matrix_plan.json"), &plan)
}

// ---------------------------------------------------------------------------------------------
// .ppm/verify.rs — a standalone, dependency-free Rust source file
// ---------------------------------------------------------------------------------------------

/// Generates and writes the standalone verifier described in §6 item 5: a single
/// self-contained `.rs` file with no external crate dependencies, embedding the lock's
/// artifacts plus a hand-rolled SHA-256 implementation and a minimal reimplementation of the
/// host tag probe from [`crate::env`] (reimplemented rather than shared, since the verifier
/// must not depend on this crate either).
fn write_verifier(env: &HostEnvironment, ppm_dir: &Path, packages: &[&ResolvedPackage]) -> Result<(), ResolveError> {
    let source = render_verifier(env, cpython_minor(env), packages);
    let path = ppm_dir.join("verify.rs");
    std::fs::write(&path, source).map_err(|e| ResolveError::OutputWrite(path.display().to_string(), e))
}

fn render_verifier(env: &HostEnvironment, cpython_minor: u32, packages: &[&ResolvedPackage]) -> String {
    let mut out = String::new();

    out.push_str(VERIFIER_PREAMBLE);

    writeln!(out, "const CPYTHON_MINOR: u32 = {cpython_minor};").ok();
    writeln!(out).ok();

    writeln!(out, "struct LockedArtifact {{").ok();
    out.push_str("    filename: &'static str,\n");
    out.push_str("    sha256: &'static str,\n");
    out.push_str("    is_wheel: bool,\n");
    out.push_str("    interpreter: &'static str,\n");
    out.push_str("    abi: &'static str,\n");
    out.push_str("    platform: &'static str,\n");
    out.push_str("}\n\n");

    writeln!(out, "const ARTIFACTS: &[LockedArtifact] = &[").ok();
    for package in packages {
        let artifact = &package.artifact;
        let (interpreter, abi, platform) = match &artifact.matched_tag {
            Some(tag) => (tag.interpreter.clone(), tag.abi.clone(), tag.platform.clone()),
            None => (String::new(), String::new(), String::new()),
        };
        writeln!(
            out,
            "    LockedArtifact {{ filename: {:?}, sha256: {:?}, is_wheel: {}, interpreter: {:?}, abi: {:?}, platform: {:?} }},",
            artifact.filename(),
            artifact.sha256,
            artifact.is_wheel(),
            interpreter,
            abi,
            platform,
        )
        .ok();
    }
    out.push_str("];\n\n");

    out.push_str(VERIFIER_BODY);
    out
}

const VERIFIER_PREAMBLE: &str = r#"// Generated by ppm-resolver. Do not edit by hand; re-run the resolver to regenerate.
//
// A standalone, dependency-free re-check of the lock this file was generated alongside: for
// every artifact it verifies that the recorded compatibility tag is still supported on the
// host it's run on, and that the cached file on disk still hashes to the recorded digest.
// Intentionally depends on nothing but `std`, so it can be compiled and run (`rustc verify.rs
// && ./verify`) without pulling in the rest of the resolver's dependency tree.

use std::fmt::Write;
use std::process::ExitCode;

"#;

const VERIFIER_BODY: &str = r#"const CACHE_DIR: &str = "cache";

fn main() -> ExitCode {
    let host_tags = host_compat_tags();
    let mut ok = true;

    for artifact in ARTIFACTS {
        if artifact.is_wheel {
            let tag = (artifact.interpreter, artifact.abi, artifact.platform);
            if !host_tags.iter().any(|t| *t == tag) {
                eprintln!(
                    "incompatible tag for {}: {}-{}-{} is not supported on this host",
                    artifact.filename, tag.0, tag.1, tag.2
                );
                ok = false;
                continue;
            }
        }

        let path = format!("{}/{}", CACHE_DIR, artifact.filename);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let digest = sha256_hex(&bytes);
                if artifact.sha256.is_empty() {
                    println!("{}: no digest recorded, skipping hash check", artifact.filename);
                } else if digest != artifact.sha256 {
                    eprintln!(
                        "digest mismatch for {}: expected {}, computed {}",
                        artifact.filename, artifact.sha256, digest
                    );
                    ok = false;
                } else {
                    println!("{}: ok ({})", artifact.filename, digest);
                }
            }
            Err(_) => {
                eprintln!("missing cache file for {}: {}", artifact.filename, path);
                ok = false;
            }
        }
    }

    if ok {
        println!("all {} artifacts verified", ARTIFACTS.len());
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    }
}

/// A minimal, std-only reimplementation of the resolver's compatibility-tag probe (see
/// `ppm_resolver::env::HostEnvironment::probe`), ordered best-first the same way.
fn host_compat_tags() -> Vec<(&'static str, &'static str, &'static str)> {
    let cp_tag: &'static str = Box::leak(format!("cp3{}", CPYTHON_MINOR).into_boxed_str());
    let platform_tags = platform_tag_candidates();

    let mut tags = Vec::new();
    for platform_tag in &platform_tags {
        tags.push((cp_tag, cp_tag, *platform_tag));
    }
    for platform_tag in &platform_tags {
        tags.push((cp_tag, "abi3", *platform_tag));
    }
    for platform_tag in &platform_tags {
        tags.push((cp_tag, "none", *platform_tag));
    }
    tags.push(("py3", "none", "any"));
    tags
}

fn platform_tag_candidates() -> Vec<&'static str> {
    if cfg!(target_os = "linux") {
        let arch = std::env::consts::ARCH;
        vec![
            Box::leak(format!("manylinux_2_17_{arch}").into_boxed_str()),
            Box::leak(format!("manylinux2014_{arch}").into_boxed_str()),
            Box::leak(format!("linux_{arch}").into_boxed_str()),
        ]
    } else if cfg!(target_os = "macos") {
        let arch = match std::env::consts::ARCH {
            "aarch64" => "arm64",
            other => other,
        };
        vec![
            Box::leak(format!("macosx_11_0_{arch}").into_boxed_str()),
            Box::leak(format!("macosx_10_9_{arch}").into_boxed_str()),
        ]
    } else if cfg!(target_os = "windows") {
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "win32",
            other => other,
        };
        vec![Box::leak(format!("win_{arch}").into_boxed_str())]
    } else {
        vec!["any"]
    }
}

/// A hand-rolled, dependency-free SHA-256 (FIPS 180-4), used instead of `rattler_digest` so
/// this file has zero external dependencies.
fn sha256_hex(data: &[u8]) -> String {
    const K: [u32; 64] = [
        0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
        0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
        0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
        0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
        0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
        0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
        0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
        0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
    ];

    let mut h: [u32; 8] = [
        0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
    ];

    let mut msg = data.to_vec();
    let bit_len = (data.len() as u64) * 8;
    msg.push(0x80);
    while msg.len() % 64 != 56 {
        msg.push(0);
    }
    msg.extend_from_slice(&bit_len.to_be_bytes());

    for chunk in msg.chunks(64) {
        let mut w = [0u32; 64];
        for i in 0..16 {
            w[i] = u32::from_be_bytes([chunk[i * 4], chunk[i * 4 + 1], chunk[i * 4 + 2], chunk[i * 4 + 3]]);
        }
        for i in 16..64 {
            let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
            let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
            w[i] = w[i - 16].wrapping_add(s0).wrapping_add(w[i - 7]).wrapping_add(s1);
        }

        let (mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut hh) =
            (h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7]);

        for i in 0..64 {
            let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
            let ch = (e & f) ^ ((!e) & g);
            let temp1 = hh.wrapping_add(s1).wrapping_add(ch).wrapping_add(K[i]).wrapping_add(w[i]);
            let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
            let maj = (a & b) ^ (a & c) ^ (b & c);
            let temp2 = s0.wrapping_add(maj);

            hh = g;
            g = f;
            f = e;
            e = d.wrapping_add(temp1);
            d = c;
            c = b;
            b = a;
            a = temp1.wrapping_add(temp2);
        }

        h[0] = h[0].wrapping_add(a);
        h[1] = h[1].wrapping_add(b);
        h[2] = h[2].wrapping_add(c);
        h[3] = h[3].wrapping_add(d);
        h[4] = h[4].wrapping_add(e);
        h[5] = h[5].wrapping_add(f);
        h[6] = h[6].wrapping_add(g);
        h[7] = h[7].wrapping_add(hh);
    }

    let mut out = String::with_capacity(64);
    for word in h {
        write!(out, "{word:08x}").ok();
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sha256_of_empty_string() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
"#;

#[cfg(test)]
mod test {
    use super::*;
    use crate::classifier::classify;
    use crate::env::DEFAULT_CPYTHON_MINOR;
    use crate::index_client::IndexRecord;
    use std::str::FromStr;

    fn test_package(env: &HostEnvironment, name: &str, version: &str, filename: &str) -> ResolvedPackage {
        let normalized: NormalizedPackageName = NormalizedPackageName::from_str(name).unwrap();
        let record = IndexRecord {
            url: format!("https://pypi.org/simple/{name}/{filename}").parse().unwrap(),
            filename: filename.to_string(),
            sha256_hint: "a".repeat(64),
        };
        let mut artifact = classify(&record, &normalized, env).unwrap();
        artifact.set_digest("a".repeat(64));
        ResolvedPackage {
            name: normalized,
            version: version.parse().unwrap(),
            marker: String::new(),
            artifact,
        }
    }

    fn config() -> ResolverConfig {
        ResolverConfig {
            root: std::env::temp_dir(),
            index_url: "https://pypi.org/simple/".parse().unwrap(),
            extra_index_urls: Vec::new(),
            requirements: Vec::new(),
            follow_transitives: true,
            strict_hash: false,
            timeout_seconds: 30,
            retries: 2,
            user_agent: "ppm-test/0.1".to_string(),
        }
    }

    #[test]
    fn test_sorted_packages_orders_by_canonical_name() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let mut resolved = IndexMap::new();
        let zeta = test_package(&env, "zeta", "1.0", "zeta-1.0-py3-none-any.whl");
        let alpha = test_package(&env, "alpha", "1.0", "alpha-1.0-py3-none-any.whl");
        resolved.insert(zeta.name.clone(), zeta);
        resolved.insert(alpha.name.clone(), alpha);

        let sorted = sorted_packages(&resolved);
        assert_eq!(sorted[0].name.as_str(), "alpha");
        assert_eq!(sorted[1].name.as_str(), "zeta");
    }

    #[test]
    fn test_lock_package_from_wheel_has_tag_fields() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let package = test_package(&env, "trio", "0.18.0", "trio-0.18.0-py3-none-any.whl");
        let lock_package = LockPackage::from(&package);
        assert_eq!(lock_package.artifacts.len(), 1);
        assert_eq!(lock_package.artifacts[0].py_tag.as_deref(), Some("py3"));
        assert_eq!(lock_package.artifacts[0].abi_tag.as_deref(), Some("none"));
        assert_eq!(lock_package.artifacts[0].plat_tag.as_deref(), Some("any"));
        assert!(lock_package.markers.is_none());
    }

    #[test]
    fn test_classify_matrix_platform_prefers_first_match() {
        let mut cfg = config();
        cfg.index_url = "https://example.com/cu118/simple/".parse().unwrap();
        cfg.extra_index_urls = vec!["https://example.com/cu126/simple/".parse().unwrap()];
        assert_eq!(classify_matrix_platform(&cfg), "cu118");
    }

    #[test]
    fn test_classify_matrix_platform_defaults_to_cpu() {
        let cfg = config();
        assert_eq!(classify_matrix_platform(&cfg), "cpu");
    }

    #[test]
    fn test_render_verifier_embeds_artifact_filename() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let package = test_package(&env, "trio", "0.18.0", "trio-0.18.0-py3-none-any.whl");
        let source = render_verifier(&env, DEFAULT_CPYTHON_MINOR, &[&package]);
        assert!(source.contains("trio-0.18.0-py3-none-any.whl"));
        assert!(source.contains("fn sha256_hex"));
        assert!(source.contains("fn main"));
    }
}
