//! The environment probe: produces the ordered compatibility tag list and the marker-evaluation
//! mapping for the host this process is running on.
//!
//! This is deliberately pure and performs no I/O: no subprocess is spawned to interrogate a
//! Python interpreter for its own tags and marker environment, unlike a reference
//! implementation that does exactly that. Everything here is derived from `cfg!`,
//! `std::env::consts`, and a configured (or defaulted) CPython feature-version used to
//! synthesize `cp3XX`-style tags.

use std::collections::HashMap;

use crate::tags::{CompatTag, CompatTags};
use crate::types::marker::Env;

/// The CPython feature version (minor version number) synthesized into `cp3XX` tags and the
/// `python_version`/`python_full_version` marker values when the caller does not override it.
pub const DEFAULT_CPYTHON_MINOR: u32 = 11;

/// A concrete, pure description of the host environment: the ordered wheel-tag list and the
/// marker-evaluation mapping.
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    tags: CompatTags,
    values: HashMap<String, String>,
}

impl HostEnvironment {
    /// Probes the current process for its platform and constructs the environment, using
    /// `cpython_minor` as the feature-version for synthesized `cp3XX` tags and the
    /// `python_version` marker value.
    pub fn probe(cpython_minor: u32) -> Self {
        let os = host_os_name();
        let sys_platform = host_sys_platform();
        let arch = host_platform_machine();
        let abi_platform_tags = platform_tag_candidates(arch);

        let python_version = format!("3.{cpython_minor}");
        let python_full_version = format!("3.{cpython_minor}.0");
        let cp_tag = format!("cp{}", python_version.replace('.', ""));

        let mut values = HashMap::new();
        values.insert("implementation_name".to_string(), "cpython".to_string());
        values.insert("implementation_version".to_string(), python_full_version.clone());
        values.insert("os_name".to_string(), os.to_string());
        values.insert("platform_system".to_string(), host_platform_system());
        values.insert("platform_machine".to_string(), arch.to_string());
        values.insert("python_version".to_string(), python_version.clone());
        values.insert("python_full_version".to_string(), python_full_version);
        values.insert("sys_platform".to_string(), sys_platform.to_string());
        values.insert("extra".to_string(), String::new());

        let mut ordered = Vec::new();
        // Most-specific first: exact CPython ABI wheels for each candidate platform tag...
        for platform_tag in &abi_platform_tags {
            ordered.push(CompatTag {
                interpreter: cp_tag.clone(),
                abi: cp_tag.clone(),
                platform: platform_tag.clone(),
            });
        }
        // ...then the CPython `abi3` stable-ABI wheels...
        for platform_tag in &abi_platform_tags {
            ordered.push(CompatTag {
                interpreter: cp_tag.clone(),
                abi: "abi3".to_string(),
                platform: platform_tag.clone(),
            });
        }
        // ...then pure-Python wheels targeting this interpreter specifically...
        for platform_tag in &abi_platform_tags {
            ordered.push(CompatTag {
                interpreter: cp_tag.clone(),
                abi: "none".to_string(),
                platform: platform_tag.clone(),
            });
        }
        // ...then the universal `py3`/`none`/`any` fallback, which matches on every platform.
        ordered.push(CompatTag {
            interpreter: "py3".to_string(),
            abi: "none".to_string(),
            platform: "any".to_string(),
        });

        HostEnvironment {
            tags: ordered.into_iter().collect(),
            values,
        }
    }

    /// The ordered, best-first compatibility tag list for this host.
    pub fn tags(&self) -> &CompatTags {
        &self.tags
    }

    /// Returns a clone of this environment with `extra` set, for evaluating an extras-gated
    /// marker in the context of one particular requested extra.
    pub fn with_extra(&self, extra: &str) -> Self {
        let mut values = self.values.clone();
        values.insert("extra".to_string(), extra.to_string());
        HostEnvironment {
            tags: self.tags.clone(),
            values,
        }
    }
}

impl Env for HostEnvironment {
    fn get(&self, key: &str) -> String {
        self.values.get(key).cloned().unwrap_or_default()
    }
}

fn host_os_name() -> &'static str {
    if cfg!(target_family = "windows") {
        "nt"
    } else {
        "posix"
    }
}

fn host_sys_platform() -> &'static str {
    if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "windows") {
        "win32"
    } else {
        std::env::consts::OS
    }
}

fn host_platform_system() -> String {
    if cfg!(target_os = "linux") {
        "Linux".to_string()
    } else if cfg!(target_os = "macos") {
        "Darwin".to_string()
    } else if cfg!(target_os = "windows") {
        "Windows".to_string()
    } else {
        std::env::consts::OS.to_string()
    }
}

fn host_platform_machine() -> &'static str {
    std::env::consts::ARCH
}

/// Returns candidate wheel platform tags for `arch`, most-specific first, mirroring the naming
/// convention PyPI wheels ship for this target triple.
fn platform_tag_candidates(arch: &str) -> Vec<String> {
    if cfg!(target_os = "linux") {
        let arch = match arch {
            "x86_64" => "x86_64",
            "aarch64" => "aarch64",
            other => other,
        };
        vec![
            format!("manylinux_2_17_{arch}"),
            format!("manylinux2014_{arch}"),
            format!("linux_{arch}"),
        ]
    } else if cfg!(target_os = "macos") {
        let arch = match arch {
            "aarch64" => "arm64",
            other => other,
        };
        vec![format!("macosx_11_0_{arch}"), format!("macosx_10_9_{arch}")]
    } else if cfg!(target_os = "windows") {
        let arch = match arch {
            "x86_64" => "amd64",
            "x86" => "win32",
            other => other,
        };
        vec![format!("win_{arch}")]
    } else {
        vec!["any".to_string()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_probe_produces_nonempty_tags() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        assert!(env.tags().tags().count() > 0);
    }

    #[test]
    fn test_universal_tag_is_always_present_and_ranks_last() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let universal = CompatTag {
            interpreter: "py3".to_string(),
            abi: "none".to_string(),
            platform: "any".to_string(),
        };
        assert!(env.tags().is_compatible(&universal));
        let universal_score = env.tags().compatibility(&universal).unwrap();
        for tag in env.tags().tags() {
            let score = env.tags().compatibility(tag).unwrap();
            assert!(score >= universal_score);
        }
    }

    #[test]
    fn test_absent_marker_key_is_empty_string() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        assert_eq!(env.get("nonexistent_key"), "");
        assert_eq!(env.get("extra"), "");
    }

    #[test]
    fn test_with_extra_overrides_only_extra() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let with_test = env.with_extra("test");
        assert_eq!(with_test.get("extra"), "test");
        assert_eq!(with_test.get("os_name"), env.get("os_name"));
    }
}
