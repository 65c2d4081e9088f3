//! Version ordering and version constraints
//!
//! Provides Maven-style version comparison and the constraint forms found in
//! module descriptors: exact versions, interval ranges, `latest.*` markers and
//! Ivy-style `+` prefixes.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors that can occur while parsing versions and constraints
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    /// Invalid version format
    #[error("Invalid version: {0:?}")]
    InvalidVersion(String),

    /// Invalid constraint format
    #[error("Invalid version constraint: {0:?}")]
    InvalidConstraint(String),
}

/// One token of a version string
#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// Decimal digits with leading zeros stripped
    Number(String),
    /// Lower-cased alphabetic qualifier
    Qualifier(String),
}

impl Item {
    fn is_null(&self) -> bool {
        match self {
            Item::Number(n) => n == "0",
            Item::Qualifier(q) => qualifier_rank(q) == RELEASE_RANK,
        }
    }
}

const RELEASE_RANK: u8 = 5;

fn qualifier_rank(q: &str) -> u8 {
    match q {
        "alpha" | "a" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => RELEASE_RANK,
        "sp" => 6,
        _ => 7,
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    qualifier_rank(a)
        .cmp(&qualifier_rank(b))
        .then_with(|| {
            if qualifier_rank(a) == 7 {
                a.cmp(b)
            } else {
                Ordering::Equal
            }
        })
}

fn compare_items(a: Option<&Item>, b: Option<&Item>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Item::Number(x)), Some(Item::Number(y))) => compare_numbers(x, y),
        (Some(Item::Qualifier(x)), Some(Item::Qualifier(y))) => compare_qualifiers(x, y),
        (Some(Item::Number(_)), Some(Item::Qualifier(_))) => Ordering::Greater,
        (Some(Item::Qualifier(_)), Some(Item::Number(_))) => Ordering::Less,
        (Some(Item::Number(x)), None) => compare_numbers(x, "0"),
        (None, Some(Item::Number(y))) => compare_numbers("0", y),
        (Some(Item::Qualifier(x)), None) => compare_qualifiers(x, ""),
        (None, Some(Item::Qualifier(y))) => compare_qualifiers("", y),
    }
}

/// A module version
///
/// Keeps the original text for display and URL construction; ordering and
/// equality follow Maven rules, so `1.0` and `1` are the same version.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    items: Vec<Item>,
}

impl Version {
    /// Parse a version string
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.is_empty()
            || s.chars()
                .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')' | ','))
        {
            return Err(VersionError::InvalidVersion(s.to_string()));
        }

        let mut items = Vec::new();
        for piece in s.split(['.', '-', '_']) {
            let mut current = String::new();
            let mut digits = false;
            for c in piece.chars() {
                let is_digit = c.is_ascii_digit();
                if !current.is_empty() && is_digit != digits {
                    items.push(Self::item(&current, digits));
                    current.clear();
                }
                digits = is_digit;
                current.push(c);
            }
            if !current.is_empty() {
                items.push(Self::item(&current, digits));
            }
        }

        if items.is_empty() {
            return Err(VersionError::InvalidVersion(s.to_string()));
        }

        // Trailing zeros and release qualifiers carry no ordering weight
        while items.len() > 1 && items.last().is_some_and(Item::is_null) {
            items.pop();
        }

        Ok(Version {
            original: s.to_string(),
            items,
        })
    }

    fn item(token: &str, digits: bool) -> Item {
        if digits {
            let trimmed = token.trim_start_matches('0');
            Item::Number(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
        } else {
            Item::Qualifier(token.to_ascii_lowercase())
        }
    }

    /// The version exactly as written
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Check whether this is a snapshot (integration) version
    pub fn is_snapshot(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i, Item::Qualifier(q) if q == "snapshot"))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // `items` is normalized, so equal versions hash equally
        self.items.hash(state);
    }
}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Item::Number(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Item::Qualifier(q) => {
                let rank = qualifier_rank(q);
                1u8.hash(state);
                rank.hash(state);
                if rank == 7 {
                    q.hash(state);
                }
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.items.len().max(other.items.len());
        for i in 0..len {
            match compare_items(self.items.get(i), other.items.get(i)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

/// One end of an interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A version interval such as `[1.0,2.0)`; a missing bound is unbounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl Interval {
    /// Check if a version falls inside the interval
    pub fn contains(&self, version: &Version) -> bool {
        let above = match &self.lower {
            None => true,
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
        };
        let below = match &self.upper {
            None => true,
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
        };
        above && below
    }

    fn parse(group: &str, whole: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidConstraint(whole.to_string());

        let open = group.chars().next().ok_or_else(invalid)?;
        let close = group.chars().last().ok_or_else(invalid)?;
        if group.len() < 2 || !matches!(open, '[' | '(') || !matches!(close, ']' | ')') {
            return Err(invalid());
        }
        let body = &group[1..group.len() - 1];

        let bound = |text: &str, inclusive: bool| -> Result<Option<Bound>, VersionError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            let version = Version::parse(text).map_err(|_| invalid())?;
            Ok(Some(Bound { version, inclusive }))
        };

        match body.split_once(',') {
            None => {
                // `[1.0]` pins a single version
                if open != '[' || close != ']' {
                    return Err(invalid());
                }
                let b = bound(body, true)?.ok_or_else(invalid)?;
                Ok(Interval {
                    lower: Some(b.clone()),
                    upper: Some(b),
                })
            }
            Some((low, high)) => {
                let interval = Interval {
                    lower: bound(low, open == '[')?,
                    upper: bound(high, close == ']')?,
                };
                if let (Some(l), Some(u)) = (&interval.lower, &interval.upper) {
                    if l.version > u.version {
                        return Err(invalid());
                    }
                }
                Ok(interval)
            }
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(u)) = (&self.lower, &self.upper) {
            if l.inclusive && u.inclusive && l.version == u.version {
                return write!(f, "[{}]", l.version);
            }
        }
        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
            None => f.write_str(")"),
        }
    }
}

/// `latest.*` markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latest {
    /// Highest non-snapshot version
    Release,
    /// Highest version of any kind
    Integration,
}

/// Version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// A specific version (`1.2.3`)
    Exact(Version),

    /// Union of intervals (`[1.0,1.5]`, `[1.0,1.2],[1.5,)`)
    Range(Vec<Interval>),

    /// `latest.release` / `latest.integration`
    Latest(Latest),

    /// Ivy prefix (`1.2.+` matches every version starting with `1.2.`)
    Prefix(String),
}

impl VersionConstraint {
    /// Parse a constraint string
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();

        match s {
            "latest.release" | "latest.stable" => return Ok(Self::Latest(Latest::Release)),
            "latest.integration" | "+" => return Ok(Self::Latest(Latest::Integration)),
            _ => {}
        }

        if s.starts_with('[') || s.starts_with('(') {
            return Self::parse_range(s);
        }

        if let Some(prefix) = s.strip_suffix('+') {
            if prefix.chars().any(|c| c.is_whitespace() || c == ',') {
                return Err(VersionError::InvalidConstraint(s.to_string()));
            }
            return Ok(Self::Prefix(prefix.to_string()));
        }

        Version::parse(s).map(Self::Exact)
    }

    fn parse_range(s: &str) -> Result<Self, VersionError> {
        let mut intervals = Vec::new();
        let mut rest = s;

        while !rest.is_empty() {
            let end = rest
                .find([']', ')'])
                .ok_or_else(|| VersionError::InvalidConstraint(s.to_string()))?;
            intervals.push(Interval::parse(&rest[..=end], s)?);

            rest = rest[end + 1..].trim_start();
            if let Some(next) = rest.strip_prefix(',') {
                rest = next.trim_start();
                if rest.is_empty() {
                    return Err(VersionError::InvalidConstraint(s.to_string()));
                }
            } else if !rest.is_empty() {
                return Err(VersionError::InvalidConstraint(s.to_string()));
            }
        }

        Ok(Self::Range(intervals))
    }

    /// The pinned version of an exact constraint
    pub fn exact(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) => Some(v),
            _ => None,
        }
    }

    /// Check if a version satisfies this constraint
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::Range(intervals) => intervals.iter().any(|i| i.contains(version)),
            Self::Latest(Latest::Release) => !version.is_snapshot(),
            Self::Latest(Latest::Integration) => true,
            Self::Prefix(prefix) => version.as_str().starts_with(prefix.as_str()),
        }
    }

    /// Pick the highest version from `available` that satisfies the constraint
    pub fn select<'a>(&self, available: &'a [Version]) -> Option<&'a Version> {
        available.iter().filter(|v| self.matches(v)).max()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{}", v),
            Self::Range(intervals) => {
                for (i, interval) in intervals.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", interval)?;
                }
                Ok(())
            }
            Self::Latest(Latest::Release) => f.write_str("latest.release"),
            Self::Latest(Latest::Integration) => f.write_str("latest.integration"),
            Self::Prefix(p) => write!(f, "{}+", p),
        }
    }
}
