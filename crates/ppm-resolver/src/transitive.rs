//! Expands a wheel's `Requires-Dist` lines into new [`Requirement`]s, gated by marker
//! evaluation (§4.6).
//!
//! This module only parses and filters; it does not touch the `seen`/`resolved` bookkeeping
//! that gives cycle defense its meaning; that lives in [`crate::resolver`] so the dedup policy
//! stays in one place.

use crate::env::HostEnvironment;
use crate::types::Requirement;

/// Parses each `Requires-Dist` line into a [`Requirement`] and retains only those whose marker
/// is absent or evaluates true against `env`.
///
/// A line that fails to parse is skipped silently, per §4.6 point 2 (`ParseError` is always
/// absorbed). This MVP does not track which extras, if any, were requested on the requirement
/// that introduced the wheel, so markers that reference `extra` are evaluated against `env`'s
/// default (empty) `extra` value, matching §4.1's "absent fields are empty strings" rule.
pub fn expand(requires_dist_lines: &[String], env: &HostEnvironment) -> Vec<Requirement> {
    requires_dist_lines
        .iter()
        .filter_map(|line| match Requirement::parse(line) {
            Ok(req) => Some(req),
            Err(err) => {
                tracing::debug!(line, error = %err, "skipping unparseable Requires-Dist line");
                None
            }
        })
        .filter(|req| match &req.marker {
            Some(marker) => marker.eval(env),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::DEFAULT_CPYTHON_MINOR;

    #[test]
    fn test_expand_keeps_markerless_requirement() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let lines = vec!["sortedcontainers".to_string()];
        let reqs = expand(&lines, &env);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].name.as_str(), "sortedcontainers");
    }

    #[test]
    fn test_expand_filters_out_false_marker() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let lines = vec!["winonly ; sys_platform == \"win32\"".to_string()];
        let reqs = expand(&lines, &env);
        assert!(reqs.iter().all(|r| env.get("sys_platform") == "win32" || r.name.as_str() != "winonly"));
        if env.get("sys_platform") != "win32" {
            assert!(reqs.is_empty());
        }
    }

    #[test]
    fn test_expand_keeps_true_marker() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let lines = vec!["lib>=2 ; python_version >= \"3.8\"".to_string()];
        let reqs = expand(&lines, &env);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].name.as_str(), "lib");
    }

    #[test]
    fn test_expand_skips_unparseable_line_silently() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let lines = vec!["not a valid requirement @@@".to_string(), "ok-package".to_string()];
        let reqs = expand(&lines, &env);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].name.as_str(), "ok-package");
    }
}
