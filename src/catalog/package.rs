// src/catalog/package.rs

//! Package metadata types shared by every universe

use crate::error::{Error, Result};
use crate::version::{Constraint, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// Where a package comes from
///
/// The declaration order is the selection priority: an installed package is
/// preferred over a prebuilt one, which is preferred over building locally.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Installed,
    #[strum(to_string = "repo")]
    #[serde(rename = "repo")]
    BinaryRepo,
    #[strum(to_string = "aur")]
    #[serde(rename = "aur")]
    SourceRepo,
}

/// Which dependency array a requirement was declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DependencyKind {
    Runtime,
    Make,
    Check,
}

/// A declared requirement: a name with an optional version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub constraint: Option<Constraint>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn with_constraint(name: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            name: name.into(),
            constraint: Some(constraint),
        }
    }

    /// Parse a pacman dependency string such as `glibc>=2.38` or `sh`
    ///
    /// Optional-dependency descriptions (`python: for scripts`) are dropped.
    pub fn parse(s: &str) -> Result<Self> {
        let s = match s.split_once(": ") {
            Some((dep, _description)) => dep,
            None => s,
        };
        let s = s.trim();

        match s.find(['<', '>', '=']) {
            Some(0) => Err(Error::DependencyParse(s.to_string())),
            Some(idx) => {
                let constraint = Constraint::parse(&s[idx..])
                    .map_err(|_| Error::DependencyParse(s.to_string()))?;
                Ok(Self::with_constraint(s[..idx].trim(), constraint))
            }
            None if s.is_empty() => Err(Error::DependencyParse(s.to_string())),
            None => Ok(Self::new(s)),
        }
    }

    /// Check a concrete name and version against this requirement
    pub fn matches(&self, name: &str, version: &Version) -> bool {
        self.name == name && crate::version::satisfies(version, self.constraint.as_ref())
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(c) => write!(f, "{}{}", self.name, c),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An alias a package satisfies besides its own name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provide {
    pub name: String,
    pub version: Option<Version>,
}

impl Provide {
    /// Parse a provides entry such as `sh` or `libfoo.so=3-64`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once('=') {
            Some((name, version)) if !name.is_empty() => Ok(Self {
                name: name.to_string(),
                version: Some(Version::parse(version)?),
            }),
            None if !s.is_empty() => Ok(Self {
                name: s.to_string(),
                version: None,
            }),
            _ => Err(Error::DependencyParse(s.to_string())),
        }
    }

    /// An unversioned provide only satisfies unversioned dependencies
    pub fn satisfies(&self, dep: &Dependency) -> bool {
        if self.name != dep.name {
            return false;
        }
        match (&dep.constraint, &self.version) {
            (None, _) => true,
            (Some(c), Some(v)) => c.satisfies(v),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for Provide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A concrete package from one universe
///
/// Packages are shared behind `Arc` once loaded and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    /// Source package base; equals `name` unless the package is split
    pub base: String,
    pub version: Version,
    pub kind: SourceKind,
    pub depends: Vec<Dependency>,
    pub make_depends: Vec<Dependency>,
    pub check_depends: Vec<Dependency>,
    pub provides: Vec<Provide>,
    pub conflicts: Vec<Dependency>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: Version, kind: SourceKind) -> Self {
        let name = name.into();
        Self {
            base: name.clone(),
            name,
            version,
            kind,
            depends: Vec::new(),
            make_depends: Vec::new(),
            check_depends: Vec::new(),
            provides: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Check whether this package satisfies a dependency by name or provides
    pub fn satisfies(&self, dep: &Dependency) -> bool {
        dep.matches(&self.name, &self.version) || self.provides.iter().any(|p| p.satisfies(dep))
    }

    /// Check whether this package answers to `name` at all
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.provides.iter().any(|p| p.name == name)
    }

    /// True if one of this package's conflicts names `other`
    ///
    /// A package never conflicts with itself, even when it both provides and
    /// conflicts with the same virtual name.
    pub fn conflicts_with(&self, other: &Package) -> bool {
        if self.name == other.name {
            return false;
        }
        self.conflicts.iter().any(|c| other.satisfies(c))
    }

    /// Dependencies relevant for building this package, tagged with their kind
    pub fn requirements(&self, check_depends: bool) -> Vec<(DependencyKind, &Dependency)> {
        let mut reqs: Vec<(DependencyKind, &Dependency)> = self
            .depends
            .iter()
            .map(|d| (DependencyKind::Runtime, d))
            .collect();

        match self.kind {
            SourceKind::Installed => return Vec::new(),
            SourceKind::BinaryRepo => {}
            SourceKind::SourceRepo => {
                reqs.extend(self.make_depends.iter().map(|d| (DependencyKind::Make, d)));
                if check_depends {
                    reqs.extend(self.check_depends.iter().map(|d| (DependencyKind::Check, d)));
                }
            }
        }
        reqs
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.kind, self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_dependency_parse() {
        let dep = Dependency::parse("glibc>=2.38").unwrap();
        assert_eq!(dep.name, "glibc");
        assert_eq!(dep.constraint.unwrap().to_string(), ">=2.38");

        let plain = Dependency::parse("sh").unwrap();
        assert_eq!(plain.name, "sh");
        assert!(plain.constraint.is_none());

        let opt = Dependency::parse("python: for helper scripts").unwrap();
        assert_eq!(opt.name, "python");
    }

    #[test]
    fn test_dependency_parse_rejects_garbage() {
        assert!(Dependency::parse("").is_err());
        assert!(Dependency::parse(">=1.0").is_err());
        assert!(Dependency::parse("foo>=").is_err());
    }

    #[test]
    fn test_provide_satisfies() {
        let versioned = Provide::parse("libfoo.so=3-64").unwrap();
        assert!(versioned.satisfies(&Dependency::parse("libfoo.so").unwrap()));
        assert!(versioned.satisfies(&Dependency::parse("libfoo.so>=3").unwrap()));
        assert!(!versioned.satisfies(&Dependency::parse("libfoo.so>=4").unwrap()));

        let bare = Provide::parse("sh").unwrap();
        assert!(bare.satisfies(&Dependency::parse("sh").unwrap()));
        assert!(!bare.satisfies(&Dependency::parse("sh>=1").unwrap()));
    }

    #[test]
    fn test_package_satisfies_and_conflicts() {
        let mut git = Package::new("foo-git", v("r120.abc-1"), SourceKind::SourceRepo);
        git.provides.push(Provide::parse("foo=2.1").unwrap());
        git.conflicts.push(Dependency::parse("foo").unwrap());

        assert!(git.satisfies(&Dependency::parse("foo>=2").unwrap()));
        assert!(git.answers_to("foo"));

        let foo = Package::new("foo", v("2.0-1"), SourceKind::BinaryRepo);
        assert!(git.conflicts_with(&foo));
        assert!(!foo.conflicts_with(&git));
        assert!(!git.conflicts_with(&git.clone()));
    }

    #[test]
    fn test_requirements_by_kind() {
        let mut pkg = Package::new("app", v("1.0-1"), SourceKind::SourceRepo);
        pkg.depends.push(Dependency::new("lib"));
        pkg.make_depends.push(Dependency::new("cmake"));
        pkg.check_depends.push(Dependency::new("pytest"));

        assert_eq!(pkg.requirements(true).len(), 3);
        let no_check = pkg.requirements(false);
        assert_eq!(no_check.len(), 2);
        assert_eq!(no_check[1].0, DependencyKind::Make);

        pkg.kind = SourceKind::BinaryRepo;
        assert_eq!(pkg.requirements(true).len(), 1);

        pkg.kind = SourceKind::Installed;
        assert!(pkg.requirements(true).is_empty());
    }

    #[test]
    fn test_source_kind_strings() {
        assert_eq!(SourceKind::BinaryRepo.to_string(), "repo");
        assert_eq!(SourceKind::from_str("aur").unwrap(), SourceKind::SourceRepo);
        assert!(SourceKind::Installed < SourceKind::BinaryRepo);
        assert!(SourceKind::BinaryRepo < SourceKind::SourceRepo);
    }
}
