// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! Versions follow pacman's `[epoch:]pkgver[-pkgrel]` format and compare with
//! the same segment algorithm as pacman's `vercmp`, so plans agree with what
//! pacman itself would accept.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed package version with epoch, pkgver and pkgrel components
#[derive(Debug, Clone)]
pub struct Version {
    pub epoch: u64,
    pub pkgver: String,
    pub pkgrel: Option<String>,
}

impl Version {
    /// Parse a version string
    ///
    /// Format: [epoch:]pkgver[-pkgrel]
    /// - "1.2.3" → epoch=0, pkgver="1.2.3", pkgrel=None
    /// - "2:1.2.3-4" → epoch=2, pkgver="1.2.3", pkgrel=Some("4")
    /// - "1.0-rc1-2" → pkgver="1.0-rc1", pkgrel=Some("2") (last dash wins)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();

        let (epoch, rest) = match s.find(':') {
            Some(colon) if colon == digits => {
                let epoch = if colon == 0 {
                    0
                } else {
                    s[..colon].parse::<u64>().map_err(|e| Error::VersionParse {
                        input: s.to_string(),
                        reason: format!("epoch: {e}"),
                    })?
                };
                (epoch, &s[colon + 1..])
            }
            Some(_) => {
                return Err(Error::VersionParse {
                    input: s.to_string(),
                    reason: "epoch must be numeric".to_string(),
                });
            }
            None => (0, s),
        };

        let (pkgver, pkgrel) = match rest.rfind('-') {
            Some(dash) => (&rest[..dash], Some(rest[dash + 1..].to_string())),
            None => (rest, None),
        };

        if pkgver.is_empty() {
            return Err(Error::VersionParse {
                input: s.to_string(),
                reason: "empty pkgver".to_string(),
            });
        }

        Ok(Self {
            epoch,
            pkgver: pkgver.to_string(),
            pkgrel,
        })
    }

    pub fn new(epoch: u64, pkgver: impl Into<String>, pkgrel: Option<&str>) -> Self {
        Self {
            epoch,
            pkgver: pkgver.into(),
            pkgrel: pkgrel.map(str::to_string),
        }
    }

    /// Compare epoch and pkgver only
    pub fn cmp_without_release(&self, other: &Version) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| segment_cmp(&self.pkgver, &other.pkgver))
    }

    /// Compare two versions under a total order
    ///
    /// A missing pkgrel sorts before any present pkgrel so that the ordering
    /// stays transitive. Constraint checks use `cmp_without_release` instead
    /// when the target carries no pkgrel.
    pub fn compare(&self, other: &Version) -> Ordering {
        self.cmp_without_release(other)
            .then_with(|| match (&self.pkgrel, &other.pkgrel) {
                (Some(a), Some(b)) => segment_cmp(a, b),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.pkgver)?;
        if let Some(ref pkgrel) = self.pkgrel {
            write!(f, "-{}", pkgrel)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two raw version strings the way pacman's `vercmp` tool does
///
/// Unlike `Version::compare`, a pkgrel is only compared when both sides have
/// one. Unparseable input falls back to a plain segment comparison.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp_without_release(&vb).then_with(|| {
            match (&va.pkgrel, &vb.pkgrel) {
                (Some(ra), Some(rb)) => segment_cmp(ra, rb),
                _ => Ordering::Equal,
            }
        }),
        _ => segment_cmp(a, b),
    }
}

/// Kind of an alphanumeric run; the ordering of the variants is significant
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SegmentKind {
    Alpha,
    // Where the end of the string sorts among segments with no separator
    End,
    Numeric,
}

/// One maximal run of digits or letters and the separators before it
#[derive(Clone, Copy)]
struct Segment<'a> {
    separator: usize,
    kind: SegmentKind,
    text: &'a [u8],
}

const END: Segment<'static> = Segment {
    separator: 0,
    kind: SegmentKind::End,
    text: &[],
};

impl Segment<'_> {
    fn compare(&self, other: &Segment<'_>) -> Ordering {
        self.separator
            .cmp(&other.separator)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| match self.kind {
                SegmentKind::Numeric => self
                    .text
                    .len()
                    .cmp(&other.text.len())
                    .then_with(|| self.text.cmp(other.text)),
                _ => self.text.cmp(other.text),
            })
    }
}

/// Splits a pkgver or pkgrel into segments; trailing separators are dropped
struct Segments<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let separator = self
            .rest
            .iter()
            .take_while(|c| !c.is_ascii_alphanumeric())
            .count();
        let rest = &self.rest[separator..];
        let first = *rest.first()?;

        let (kind, len) = if first.is_ascii_digit() {
            (SegmentKind::Numeric, rest.iter().take_while(|c| c.is_ascii_digit()).count())
        } else {
            (SegmentKind::Alpha, rest.iter().take_while(|c| c.is_ascii_alphabetic()).count())
        };
        self.rest = &rest[len..];

        let text = match kind {
            SegmentKind::Numeric => strip_leading_zeros(&rest[..len]),
            _ => &rest[..len],
        };
        Some(Segment {
            separator,
            kind,
            text,
        })
    }
}

/// Segment-by-segment comparison of a single pkgver or pkgrel string
///
/// Segments compare by preceding separator length (shorter is older), then
/// kind (numeric is newer than alphabetic), then value. The end of a string
/// is newer than a letter run directly attached to the last segment
/// (`1.0rc1 < 1.0`) and older than anything else (`1.0 < 1.0.1`,
/// `1.5 < 1.5.a`). This agrees with pacman's `rpmvercmp` except on strings
/// with trailing separators or runs of mixed separators, where pacman's
/// result is not transitive.
fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut left = Segments { rest: a.as_bytes() };
    let mut right = Segments { rest: b.as_bytes() };
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (x, y) => {
                let ord = x.unwrap_or(END).compare(&y.unwrap_or(END));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn strip_leading_zeros(seg: &[u8]) -> &[u8] {
    let zeros = seg.iter().take_while(|&&c| c == b'0').count();
    &seg[zeros..]
}

/// Relational operator of a versioned dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
}

impl Relation {
    fn as_str(self) -> &'static str {
        match self {
            Relation::Less => "<",
            Relation::LessOrEqual => "<=",
            Relation::Equal => "=",
            Relation::GreaterOrEqual => ">=",
            Relation::Greater => ">",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Relation::Less => ord == Ordering::Less,
            Relation::LessOrEqual => ord != Ordering::Greater,
            Relation::Equal => ord == Ordering::Equal,
            Relation::GreaterOrEqual => ord != Ordering::Less,
            Relation::Greater => ord == Ordering::Greater,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A version requirement such as `>=1.2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub relation: Relation,
    pub version: Version,
}

impl Constraint {
    pub fn new(relation: Relation, version: Version) -> Self {
        Self { relation, version }
    }

    /// Parse a constraint string
    ///
    /// - ">=1.2.3" → GreaterOrEqual(1.2.3)
    /// - "< 2.0" → Less(2.0)
    /// - "=1:1.5-2" → Equal(1:1.5-2)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (relation, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (Relation::GreaterOrEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Relation::LessOrEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Relation::Greater, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Relation::Less, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Relation::Equal, rest)
        } else {
            return Err(Error::VersionParse {
                input: s.to_string(),
                reason: "missing relation operator".to_string(),
            });
        };

        Ok(Self {
            relation,
            version: Version::parse(rest)?,
        })
    }

    /// Check if a version satisfies this constraint
    ///
    /// When the target has no pkgrel, the candidate's pkgrel is ignored:
    /// `>=1.2` accepts `1.2-1` and `=1.2` accepts any release of 1.2.
    pub fn satisfies(&self, version: &Version) -> bool {
        let ord = if self.version.pkgrel.is_none() {
            version.cmp_without_release(&self.version)
        } else {
            version.compare(&self.version)
        };
        self.relation.accepts(ord)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.relation, self.version)
    }
}

/// Check an optional constraint; `None` accepts every version
pub fn satisfies(version: &Version, constraint: Option<&Constraint>) -> bool {
    constraint.is_none_or(|c| c.satisfies(version))
}
