//! Dependency version conflict resolution.
//!
//! Every package requested by more than one module gets exactly one version string:
//! exact pins beat ranges, the highest pin wins among pins, and among ranges the highest
//! candidate satisfying every range selects the alternatives whose intersection is emitted.
//! When no candidate satisfies everything the highest candidate is used and the package is
//! reported as a conflict.

use super::constraint::{ConstraintKind, VersionConstraint, VersionInterval};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,
}

/// A package whose requested constraints could not all be honored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConflict {
    pub package: String,
    pub requested: Vec<String>,
    pub chosen: String,
    pub reason: String,
}

/// One request for a package: the constraint text and the module that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    pub range: String,
    pub requested_by: String,
}

/// Resolve every package in `requests`, returning the resolved map plus any conflicts.
pub fn resolve_all(
    requests: &BTreeMap<String, Vec<DependencyRequest>>,
) -> (BTreeMap<String, String>, Vec<DependencyConflict>) {
    let mut resolved = BTreeMap::new();
    let mut conflicts = Vec::new();

    for (package, package_requests) in requests {
        let ranges: Vec<String> = package_requests.iter().map(|r| r.range.clone()).collect();
        let resolution = resolve(package, &ranges);

        if let Some(reason) = &resolution.conflict {
            let requested_by: Vec<String> = package_requests
                .iter()
                .map(|r| format!("{} ({})", r.requested_by, r.range))
                .collect();
            warn!(
                package = %package,
                chosen = %resolution.version,
                requested = %requested_by.join(", "),
                "Dependency version conflict: {}",
                reason
            );
            conflicts.push(DependencyConflict {
                package: package.clone(),
                requested: ranges,
                chosen: resolution.version.clone(),
                reason: reason.clone(),
            });
        }

        resolved.insert(package.clone(), resolution.version);
    }

    (resolved, conflicts)
}

/// Resolve the constraint strings requested for one package, in request order.
pub fn resolve(package: &str, requested: &[String]) -> Resolution {
    let mut distinct: Vec<&str> = Vec::new();
    for raw in requested {
        let raw = raw.trim();
        if !distinct.contains(&raw) {
            distinct.push(raw);
        }
    }

    match distinct.len() {
        0 => {
            return Resolution {
                version: "*".to_string(),
                conflict: None,
            }
        }
        1 => {
            return Resolution {
                version: distinct[0].to_string(),
                conflict: None,
            }
        }
        _ => {}
    }

    let mut pins: Vec<(Version, VersionConstraint)> = Vec::new();
    let mut ranges: Vec<VersionConstraint> = Vec::new();
    let mut unusable: Vec<&str> = Vec::new();

    for raw in &distinct {
        match VersionConstraint::parse(raw) {
            Ok(constraint) => match &constraint.kind {
                ConstraintKind::Exact(version) => pins.push((version.clone(), constraint.clone())),
                ConstraintKind::Range(_) => ranges.push(constraint),
                ConstraintKind::Tag => unusable.push(raw),
            },
            Err(err) => {
                debug!(package, constraint = %raw, error = %err, "Ignoring unparseable constraint");
                unusable.push(raw);
            }
        }
    }

    if !pins.is_empty() {
        return resolve_pins(&pins, &ranges);
    }
    if !ranges.is_empty() {
        return resolve_ranges(&ranges);
    }

    Resolution {
        version: distinct[0].to_string(),
        conflict: Some(format!(
            "no comparable constraints among {}; using first requested '{}'",
            unusable.join(", "),
            distinct[0]
        )),
    }
}

fn resolve_pins(pins: &[(Version, VersionConstraint)], ranges: &[VersionConstraint]) -> Resolution {
    // max_by keeps the last maximum; iterate in reverse so ties go to the first request
    let Some((chosen_version, chosen)) = pins
        .iter()
        .rev()
        .max_by(|a, b| a.0.cmp_precedence(&b.0))
    else {
        return resolve_ranges(ranges);
    };

    let mut problems = Vec::new();
    let distinct_pins: Vec<String> = {
        let mut seen: Vec<&Version> = Vec::new();
        for (version, _) in pins {
            if !seen.iter().any(|v| v.cmp_precedence(version).is_eq()) {
                seen.push(version);
            }
        }
        seen.iter().map(|v| v.to_string()).collect()
    };
    if distinct_pins.len() > 1 {
        problems.push(format!("multiple exact pins ({})", distinct_pins.join(", ")));
    }

    let unsatisfied: Vec<&str> = ranges
        .iter()
        .filter(|r| !r.satisfies(chosen_version))
        .map(|r| r.raw.as_str())
        .collect();
    if !unsatisfied.is_empty() {
        problems.push(format!(
            "pinned {} does not satisfy {}",
            chosen.canonical(),
            unsatisfied.join(", ")
        ));
    }

    Resolution {
        version: chosen.canonical(),
        conflict: (!problems.is_empty()).then(|| problems.join("; ")),
    }
}

fn resolve_ranges(ranges: &[VersionConstraint]) -> Resolution {
    let mut candidates: Vec<(Version, &VersionConstraint)> = ranges
        .iter()
        .filter_map(|r| r.floor().map(|floor| (floor, r)))
        .collect();
    // highest first; stable so equal floors keep request order
    candidates.sort_by(|a, b| b.0.cmp_precedence(&a.0));

    if let Some((candidate, _)) = candidates
        .iter()
        .find(|(candidate, _)| ranges.iter().all(|r| r.satisfies(candidate)))
    {
        return Resolution {
            version: narrowed(ranges, candidate),
            conflict: None,
        };
    }

    let requested: Vec<&str> = ranges.iter().map(|r| r.raw.as_str()).collect();
    let Some((highest, owner)) = candidates.first() else {
        return Resolution {
            version: requested.first().map(|s| s.to_string()).unwrap_or_else(|| "*".to_string()),
            conflict: Some("no comparable constraints".to_string()),
        };
    };
    Resolution {
        version: owner.raw.clone(),
        conflict: Some(format!(
            "no version satisfies all of {}; using highest candidate {} from '{}'",
            requested.join(", "),
            highest,
            owner.raw
        )),
    }
}

/// The range every request agrees on around `candidate`. A request whose own range already
/// equals the intersection keeps its original spelling.
fn narrowed(ranges: &[VersionConstraint], candidate: &Version) -> String {
    let intersection = ranges
        .iter()
        .filter_map(|r| r.interval_containing(candidate))
        .fold(VersionInterval::default(), |acc, interval| acc.intersect(&interval));

    ranges
        .iter()
        .find(|r| matches!(r.intervals().as_slice(), [only] if *only == intersection))
        .map(|r| r.raw.clone())
        .unwrap_or_else(|| intersection.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_constraint_is_verbatim() {
        let r = resolve("express", &strings(&["^4.0.0", "^4.0.0"]));
        assert_eq!(r.version, "^4.0.0");
        assert!(r.conflict.is_none());
    }

    #[test]
    fn test_exact_pin_beats_range() {
        let r = resolve("express", &strings(&["^4.0.0", "4.18.2"]));
        assert_eq!(r.version, "4.18.2");
        assert!(r.conflict.is_none());
    }

    #[test]
    fn test_highest_pin_wins() {
        let r = resolve("lodash", &strings(&["4.17.20", "4.17.21", "=4.17.19"]));
        assert_eq!(r.version, "4.17.21");
        assert!(r.conflict.unwrap().contains("multiple exact pins"));
    }

    #[test]
    fn test_pip_pin_is_canonicalized() {
        let r = resolve("requests", &strings(&["==2.31.0", ">=2.0"]));
        assert_eq!(r.version, "2.31.0");
        assert!(r.conflict.is_none());
    }

    #[test]
    fn test_pin_outside_range_is_conflict() {
        let r = resolve("express", &strings(&["^5.0.0", "4.18.2"]));
        assert_eq!(r.version, "4.18.2");
        assert!(r.conflict.unwrap().contains("does not satisfy ^5.0.0"));
    }

    #[test]
    fn test_ranges_pick_highest_compatible() {
        let r = resolve("zod", &strings(&["^3.0.0", "^3.22.0", ">=3.10"]));
        assert_eq!(r.version, "^3.22.0");
        assert!(r.conflict.is_none());
    }

    #[test]
    fn test_overlapping_ranges_are_narrowed_to_intersection() {
        let r = resolve("lodash", &strings(&["^1.2.0", ">=1.0.0 <1.3.0"]));
        assert_eq!(r.version, ">=1.2.0, <1.3.0");
        assert!(r.conflict.is_none());

        let resolved = VersionConstraint::parse(&r.version).unwrap();
        assert!(resolved.satisfies(&Version::new(1, 2, 9)));
        assert!(!resolved.satisfies(&Version::new(1, 3, 0)));
    }

    #[test]
    fn test_or_ranges_narrow_to_shared_alternative() {
        let r = resolve("react", &strings(&["^17.0.0 || ^18.0.0", "^18.2.0"]));
        assert_eq!(r.version, "^18.2.0");
        assert!(r.conflict.is_none());
    }

    #[test]
    fn test_compatible_release_accepts_newer_minor_pin() {
        let r = resolve("requests", &strings(&["~=2.28", "2.31.0"]));
        assert_eq!(r.version, "2.31.0");
        assert!(r.conflict.is_none());
    }

    #[test]
    fn test_incompatible_ranges_fall_back_to_highest() {
        let r = resolve("react", &strings(&["^17.0.0", "^18.2.0"]));
        assert_eq!(r.version, "^18.2.0");
        assert!(r.conflict.unwrap().contains("no version satisfies"));
    }

    #[test]
    fn test_tags_lose_to_comparable_constraints() {
        let r = resolve("typescript", &strings(&["latest", "^5.0.0"]));
        assert_eq!(r.version, "^5.0.0");
        assert!(r.conflict.is_none());
    }

    #[test]
    fn test_only_tags_uses_first() {
        let r = resolve("x", &strings(&["latest", "next"]));
        assert_eq!(r.version, "latest");
        assert!(r.conflict.is_some());
    }

    #[test]
    fn test_resolve_all_is_deterministic() {
        let mut requests = BTreeMap::new();
        requests.insert(
            "express".to_string(),
            vec![
                DependencyRequest {
                    range: "^4.0.0".to_string(),
                    requested_by: "a".to_string(),
                },
                DependencyRequest {
                    range: "4.18.2".to_string(),
                    requested_by: "b".to_string(),
                },
            ],
        );
        requests.insert(
            "react".to_string(),
            vec![
                DependencyRequest {
                    range: "^17.0.0".to_string(),
                    requested_by: "a".to_string(),
                },
                DependencyRequest {
                    range: "^18.0.0".to_string(),
                    requested_by: "b".to_string(),
                },
            ],
        );

        let (first, conflicts) = resolve_all(&requests);
        let (second, _) = resolve_all(&requests);
        assert_eq!(first, second);
        assert_eq!(first["express"], "4.18.2");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].package, "react");
    }
}
