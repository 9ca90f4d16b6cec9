//! Version constraint parsing for npm and pip spellings.
//!
//! Constraints are mapped onto `semver` so that exact pins and ranges from both ecosystems
//! can be compared with one precedence order.

use regex::Regex;
use semver::{Comparator, Op, Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("empty version constraint")]
    Empty,

    #[error("'{raw}' is not a valid version constraint: {reason}")]
    Invalid { raw: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// A single version, e.g. `4.18.2`, `==2.31.0`, `v1.2`.
    Exact(Version),
    /// One or more `||` alternatives.
    Range(Vec<VersionReq>),
    /// Dist-tags and non-registry references (`latest`, `git+https://...`, `file:../x`).
    /// Well-formed but never comparable.
    Tag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionConstraint {
    pub raw: String,
    pub kind: ConstraintKind,
}

fn dist_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("Invalid dist-tag regex"))
}

fn operator_space_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(<=|>=|==|~=|!=|[<>=~^])\s+").expect("Invalid operator regex"))
}

fn is_reference(raw: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "git+", "git://", "http://", "https://", "file:", "link:", "workspace:", "npm:",
        "github:", "gitlab:", "bitbucket:", "./", "../",
    ];
    PREFIXES.iter().any(|p| raw.starts_with(p)) || raw.contains('#') || raw.contains('/')
}

/// Parse `1`, `1.2`, `v1.2.3`, `1.2.3-beta.1` into a full version, padding missing parts.
pub fn parse_lenient_version(text: &str) -> Option<Version> {
    let text = text.trim().trim_start_matches(['v', 'V']);
    if text.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(text) {
        return Some(version);
    }

    let (core, suffix) = match text.find(['-', '+']) {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    let numeric = |p: &&str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    if parts.len() > 3 || !parts.iter().all(numeric) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    Version::parse(&format!("{}{}", padded, suffix)).ok()
}

fn strip_exact_prefix(raw: &str) -> &str {
    raw.strip_prefix("===")
        .or_else(|| raw.strip_prefix("=="))
        .or_else(|| raw.strip_prefix('='))
        .unwrap_or(raw)
        .trim()
}

/// PEP 440 `~=X.Y[.Z]`: at least the given version, below the next bump of its second-to-last
/// component. `~=2.28` is `>=2.28, <3` and `~=1.4.5` is `>=1.4.5, <1.5`.
fn compatible_release(version: &str) -> String {
    let parts: Vec<&str> = version.split('.').collect();
    let numeric: Option<Vec<u64>> = parts.iter().map(|p| p.parse().ok()).collect();
    match numeric {
        Some(mut numbers) if numbers.len() >= 2 => {
            numbers.pop();
            if let Some(last) = numbers.last_mut() {
                *last += 1;
            }
            let upper: Vec<String> = numbers.iter().map(u64::to_string).collect();
            format!(">={}, <{}", version, upper.join("."))
        }
        _ => format!(">={}", version),
    }
}

/// Rewrite one `||` alternative into `semver::VersionReq` syntax.
fn normalize_alternative(alt: &str) -> String {
    let alt = alt.trim();

    // npm hyphen range: 1.0.0 - 2.0.0
    if let Some((low, high)) = alt.split_once(" - ") {
        return format!(">={}, <={}", low.trim(), high.trim());
    }

    let tightened = operator_space_regex().replace_all(alt, "$1");
    let comparators: Vec<String> = tightened
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        // pip exclusions have no semver equivalent
        .filter(|s| !s.starts_with("!="))
        .map(|s| {
            let s = if let Some(rest) = s.strip_prefix("===") {
                format!("={}", rest)
            } else if let Some(rest) = s.strip_prefix("==") {
                format!("={}", rest)
            } else if let Some(rest) = s.strip_prefix("~=") {
                compatible_release(rest)
            } else {
                s.to_string()
            };
            s.split('.')
                .map(|part| if part == "x" || part == "X" { "*" } else { part })
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect();

    if comparators.is_empty() {
        "*".to_string()
    } else {
        comparators.join(", ")
    }
}

impl VersionConstraint {
    pub fn parse(raw: &str) -> Result<Self, ConstraintError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConstraintError::Empty);
        }

        let exact_text = strip_exact_prefix(trimmed);
        if !exact_text.contains(['*', ' ', ',', '<', '>', '^', '~', '|'])
            && !exact_text.split('.').any(|p| p == "x" || p == "X")
        {
            if let Some(version) = parse_lenient_version(exact_text) {
                return Ok(Self {
                    raw: trimmed.to_string(),
                    kind: ConstraintKind::Exact(version),
                });
            }
        }

        let is_tag = dist_tag_regex().is_match(trimmed) && !trimmed.eq_ignore_ascii_case("x");
        if is_tag || is_reference(trimmed) {
            return Ok(Self {
                raw: trimmed.to_string(),
                kind: ConstraintKind::Tag,
            });
        }

        let mut alternatives = Vec::new();
        for alt in trimmed.split("||") {
            let normalized = normalize_alternative(alt);
            let req = VersionReq::parse(&normalized).map_err(|e| ConstraintError::Invalid {
                raw: trimmed.to_string(),
                reason: e.to_string(),
            })?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            kind: ConstraintKind::Range(alternatives),
        })
    }

    pub fn is_exact(&self) -> bool {
        matches!(self.kind, ConstraintKind::Exact(_))
    }

    pub fn is_comparable(&self) -> bool {
        !matches!(self.kind, ConstraintKind::Tag)
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        match &self.kind {
            ConstraintKind::Exact(pinned) => {
                pinned.major == version.major
                    && pinned.minor == version.minor
                    && pinned.patch == version.patch
                    && pinned.pre == version.pre
            }
            ConstraintKind::Range(alternatives) => alternatives.iter().any(|req| req.matches(version)),
            ConstraintKind::Tag => false,
        }
    }

    /// Lowest version named by the constraint's lower bounds, used as a resolution candidate.
    pub fn floor(&self) -> Option<Version> {
        match &self.kind {
            ConstraintKind::Exact(version) => Some(version.clone()),
            ConstraintKind::Range(alternatives) => alternatives
                .iter()
                .map(|req| {
                    req.comparators
                        .iter()
                        .filter_map(comparator_floor)
                        .max()
                        .unwrap_or_else(|| Version::new(0, 0, 0))
                })
                .min(),
            ConstraintKind::Tag => None,
        }
    }

    /// Interval of the alternative that admits `version`, or `None` when nothing does.
    pub fn interval_containing(&self, version: &Version) -> Option<VersionInterval> {
        match &self.kind {
            ConstraintKind::Exact(pinned) if self.satisfies(version) => Some(VersionInterval::exactly(pinned)),
            ConstraintKind::Range(alternatives) => alternatives
                .iter()
                .find(|req| req.matches(version))
                .map(VersionInterval::of_req),
            _ => None,
        }
    }

    /// Intervals of every alternative, empty for tags.
    pub fn intervals(&self) -> Vec<VersionInterval> {
        match &self.kind {
            ConstraintKind::Exact(pinned) => vec![VersionInterval::exactly(pinned)],
            ConstraintKind::Range(alternatives) => alternatives.iter().map(VersionInterval::of_req).collect(),
            ConstraintKind::Tag => Vec::new(),
        }
    }

    /// Spelling used in manifests: exact pins lose their `=`/`==`/`v` prefix.
    pub fn canonical(&self) -> String {
        match &self.kind {
            ConstraintKind::Exact(_) => strip_exact_prefix(&self.raw)
                .trim_start_matches(['v', 'V'])
                .to_string(),
            _ => self.raw.clone(),
        }
    }
}

/// One end of a [`VersionInterval`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// The contiguous set of versions one range alternative admits. Missing bounds are open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInterval {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl VersionInterval {
    pub fn exactly(version: &Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version.clone())),
            upper: Some(Bound::inclusive(version.clone())),
        }
    }

    pub fn of_req(req: &VersionReq) -> Self {
        req.comparators
            .iter()
            .map(Self::of_comparator)
            .fold(Self::default(), |acc, interval| acc.intersect(&interval))
    }

    fn of_comparator(comparator: &Comparator) -> Self {
        let major = comparator.major;
        let mut base = Version::new(major, comparator.minor.unwrap_or(0), comparator.patch.unwrap_or(0));
        base.pre = comparator.pre.clone();

        // first version past a partially written one: 1 -> 2.0.0, 1.2 -> 1.3.0
        let past_partial = match (comparator.minor, comparator.patch) {
            (None, _) => Some(Version::new(major + 1, 0, 0)),
            (Some(minor), None) => Some(Version::new(major, minor + 1, 0)),
            (Some(_), Some(_)) => None,
        };

        match comparator.op {
            Op::Exact | Op::Wildcard => match past_partial {
                Some(next) => Self {
                    lower: Some(Bound::inclusive(base)),
                    upper: Some(Bound::exclusive(next)),
                },
                None => Self::exactly(&base),
            },
            Op::Greater => Self {
                lower: Some(match past_partial {
                    Some(next) => Bound::inclusive(next),
                    None => Bound::exclusive(base),
                }),
                upper: None,
            },
            Op::GreaterEq => Self {
                lower: Some(Bound::inclusive(base)),
                upper: None,
            },
            Op::Less => Self {
                lower: None,
                upper: Some(Bound::exclusive(base)),
            },
            Op::LessEq => Self {
                lower: None,
                upper: Some(match past_partial {
                    Some(next) => Bound::exclusive(next),
                    None => Bound::inclusive(base),
                }),
            },
            Op::Tilde => {
                let next = match comparator.minor {
                    Some(minor) => Version::new(major, minor + 1, 0),
                    None => Version::new(major + 1, 0, 0),
                };
                Self {
                    lower: Some(Bound::inclusive(base)),
                    upper: Some(Bound::exclusive(next)),
                }
            }
            Op::Caret => {
                let next = match (major, comparator.minor, comparator.patch) {
                    (0, None, _) => Version::new(1, 0, 0),
                    (0, Some(0), None) => Version::new(0, 1, 0),
                    (0, Some(0), Some(patch)) => Version::new(0, 0, patch + 1),
                    (0, Some(minor), _) => Version::new(0, minor + 1, 0),
                    _ => Version::new(major + 1, 0, 0),
                };
                Self {
                    lower: Some(Bound::inclusive(base)),
                    upper: Some(Bound::exclusive(next)),
                }
            }
            _ => Self::default(),
        }
    }

    /// Versions admitted by both intervals.
    pub fn intersect(&self, other: &Self) -> Self {
        let lower = match (&self.lower, &other.lower) {
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        let upper = match (&self.upper, &other.upper) {
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        Self { lower, upper }
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.version.cmp(&upper.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    fn single_version(&self) -> Option<&Version> {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper))
                if lower.inclusive && upper.inclusive && lower.version == upper.version =>
            {
                Some(&lower.version)
            }
            _ => None,
        }
    }

    fn comparators(&self, exact_op: &str) -> Vec<String> {
        if let Some(version) = self.single_version() {
            return vec![format!("{}{}", exact_op, version)];
        }
        let mut out = Vec::new();
        if let Some(lower) = &self.lower {
            out.push(format!("{}{}", if lower.inclusive { ">=" } else { ">" }, lower.version));
        }
        if let Some(upper) = &self.upper {
            out.push(format!("{}{}", if upper.inclusive { "<=" } else { "<" }, upper.version));
        }
        out
    }

    /// npm range syntax: space-separated comparators, `*` when unbounded.
    pub fn to_npm(&self) -> String {
        if self.is_unbounded() {
            return "*".to_string();
        }
        self.comparators("").join(" ")
    }

    /// PEP 440 specifier set, empty when unbounded.
    pub fn to_pip(&self) -> String {
        self.comparators("==").join(",")
    }
}

impl fmt::Display for VersionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            return write!(f, "*");
        }
        write!(f, "{}", self.comparators("").join(", "))
    }
}

fn comparator_floor(comparator: &Comparator) -> Option<Version> {
    match comparator.op {
        Op::Less | Op::LessEq => None,
        _ => {
            let mut version = Version::new(
                comparator.major,
                comparator.minor.unwrap_or(0),
                comparator.patch.unwrap_or(0),
            );
            version.pre = comparator.pre.clone();
            Some(version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        bare = { "4.18.2", "4.18.2" },
        double_equals = { "==2.31.0", "2.31.0" },
        single_equals = { "=1.2.3", "1.2.3" },
        v_prefix = { "v1.2", "1.2" },
        prerelease = { "1.0.0-beta.2", "1.0.0-beta.2" },
    )]
    fn test_exact_pins(raw: &str, canonical: &str) {
        let constraint = VersionConstraint::parse(raw).unwrap();
        assert!(constraint.is_exact(), "{} should be exact", raw);
        assert_eq!(constraint.canonical(), canonical);
    }

    #[parameterized(
        caret = { "^4.0.0", "4.17.1", true },
        caret_major_bump = { "^4.0.0", "5.0.0", false },
        tilde = { "~1.2.0", "1.2.9", true },
        pip_compatible = { "~=2.28", "2.31.0", true },
        pip_compatible_next_major = { "~=2.28", "3.0.0", false },
        pip_compatible_below = { "~=2.28", "2.27.9", false },
        pip_compatible_patch = { "~=1.4.5", "1.4.9", true },
        pip_compatible_patch_next_minor = { "~=1.4.5", "1.5.0", false },
        pip_range = { ">=2.0,<3.0", "2.31.0", true },
        space_separated = { ">= 1.0.0 < 2.0.0", "1.5.0", true },
        x_wildcard = { "1.x", "1.9.0", true },
        star = { "*", "9.9.9", true },
        alternatives = { "^1.0.0 || ^2.0.0", "2.3.0", true },
        hyphen = { "1.0.0 - 2.0.0", "2.0.0", true },
        pip_exclusion_dropped = { ">=1.0, !=1.5.0", "1.5.0", true },
    )]
    fn test_ranges(raw: &str, version: &str, expected: bool) {
        let constraint = VersionConstraint::parse(raw).unwrap();
        assert!(!constraint.is_exact());
        let version = Version::parse(version).unwrap();
        assert_eq!(constraint.satisfies(&version), expected);
    }

    #[test]
    fn test_tags_are_not_comparable() {
        for raw in ["latest", "next", "git+https://github.com/a/b.git", "file:../local"] {
            let constraint = VersionConstraint::parse(raw).unwrap();
            assert!(!constraint.is_comparable(), "{}", raw);
            assert_eq!(constraint.floor(), None);
        }
    }

    #[test]
    fn test_invalid_constraints() {
        assert_eq!(VersionConstraint::parse("  "), Err(ConstraintError::Empty));
        assert!(VersionConstraint::parse(">=>=1").is_err());
        assert!(VersionConstraint::parse("^1.0.0.0.0").is_err());
    }

    #[test]
    fn test_floor() {
        let floor = |raw: &str| VersionConstraint::parse(raw).unwrap().floor().unwrap();
        assert_eq!(floor("^4.17.0"), Version::new(4, 17, 0));
        assert_eq!(floor(">=1.2, <2"), Version::new(1, 2, 0));
        assert_eq!(floor("<2.0.0"), Version::new(0, 0, 0));
        assert_eq!(floor("^1.0.0 || ^2.0.0"), Version::new(1, 0, 0));
    }

    #[parameterized(
        caret = { "^1.26", ">=1.26.0, <2.0.0" },
        caret_zero_minor = { "^0.2.3", ">=0.2.3, <0.3.0" },
        caret_zero_patch = { "^0.0.3", ">=0.0.3, <0.0.4" },
        tilde = { "~1.2.0", ">=1.2.0, <1.3.0" },
        x_range = { "1.x", ">=1.0.0, <2.0.0" },
        partial_wildcard = { "1.2.*", ">=1.2.0, <1.3.0" },
        space_separated = { ">= 1.0.0 < 2.0.0", ">=1.0.0, <2.0.0" },
        hyphen = { "1.0.0 - 2.0.0", ">=1.0.0, <=2.0.0" },
        partial_greater = { ">1.2", ">=1.3.0" },
        partial_less_eq = { "<=1.2", "<1.3.0" },
        pip_compatible = { "~=2.28", ">=2.28.0, <3.0.0" },
        exact = { "==2.31.0", "2.31.0" },
        star = { "*", "*" },
    )]
    fn test_intervals(raw: &str, expected: &str) {
        let intervals = VersionConstraint::parse(raw).unwrap().intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].to_string(), expected);
    }

    #[test]
    fn test_interval_intersection() {
        let interval = |raw: &str| VersionConstraint::parse(raw).unwrap().intervals().remove(0);
        let both = interval("^1.2.0").intersect(&interval(">=1.0.0 <1.3.0"));
        assert_eq!(both.to_string(), ">=1.2.0, <1.3.0");
        assert!(!both.is_empty());

        assert!(interval("^1.0.0").intersect(&interval("^2.0.0")).is_empty());
        assert!(interval("<=1.2.3").intersect(&interval(">1.2.3")).is_empty());
        assert_eq!(interval("<=1.2.3").intersect(&interval(">=1.2.3")).to_string(), "1.2.3");
    }

    #[test]
    fn test_interval_renderings() {
        let interval = VersionConstraint::parse("^1.26").unwrap().intervals().remove(0);
        assert_eq!(interval.to_pip(), ">=1.26.0,<2.0.0");
        assert_eq!(interval.to_npm(), ">=1.26.0 <2.0.0");

        let pin = VersionInterval::exactly(&Version::new(2, 31, 0));
        assert_eq!(pin.to_pip(), "==2.31.0");
        assert_eq!(pin.to_npm(), "2.31.0");

        let open = VersionInterval::default();
        assert_eq!(open.to_pip(), "");
        assert_eq!(open.to_npm(), "*");
    }

    #[test]
    fn test_interval_containing_picks_matching_alternative() {
        let constraint = VersionConstraint::parse("^1.0.0 || ^2.0.0").unwrap();
        let interval = constraint.interval_containing(&Version::new(2, 3, 0)).unwrap();
        assert_eq!(interval.to_string(), ">=2.0.0, <3.0.0");
        assert!(constraint.interval_containing(&Version::new(3, 0, 0)).is_none());
    }

    #[test]
    fn test_lenient_version() {
        assert_eq!(parse_lenient_version("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_lenient_version("v2.3"), Some(Version::new(2, 3, 0)));
        assert!(parse_lenient_version("1.0.post1").is_none());
        assert!(parse_lenient_version("").is_none());
    }
}
