// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian package version string handling. */

use {
    std::{
        cmp::Ordering,
        fmt::{Display, Formatter},
        num::ParseIntError,
        str::FromStr,
    },
    thiserror::Error,
};

#[derive(Clone, Debug, Error)]
pub enum VersionError {
    #[error("error parsing string to integer: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("the epoch component has non-digit characters: {0}")]
    EpochNonNumeric(String),

    #[error("upstream_version component is empty: {0}")]
    UpstreamVersionEmpty(String),

    #[error("upstream_version component has illegal character: {0}")]
    UpstreamVersionIllegalChar(String),

    #[error("debian_revision component has illegal character: {0}")]
    DebianRevisionIllegalChar(String),
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// A Debian package version.
///
/// Versions have the form `[epoch:]upstream_version[-debian_revision]` and
/// sort according to the rules in
/// <https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageVersion {
    epoch: Option<u32>,
    upstream_version: String,
    debian_revision: Option<String>,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Result<Self> {
        // Epoch is the part before a colon, if present. upstream_version and
        // debian_revision are discovered by splitting on the last hyphen.

        let (epoch, remainder) = if let Some(pos) = s.find(':') {
            (Some(&s[0..pos]), &s[pos + 1..])
        } else {
            (None, s)
        };

        let (upstream, debian) = if let Some(pos) = remainder.rfind('-') {
            (&remainder[0..pos], Some(&remainder[pos + 1..]))
        } else {
            (remainder, None)
        };

        let epoch = if let Some(epoch) = epoch {
            if !epoch.chars().all(|c| c.is_ascii_digit()) {
                return Err(VersionError::EpochNonNumeric(s.to_string()));
            }

            Some(u32::from_str(epoch)?)
        } else {
            None
        };

        if upstream.is_empty() {
            return Err(VersionError::UpstreamVersionEmpty(s.to_string()));
        }

        // The upstream_version must contain only alphanumerics and the
        // characters . + ~ (and hyphens when a debian_revision is present).
        if !upstream.chars().all(|c| match c {
            c if c.is_ascii_alphanumeric() => true,
            '.' | '+' | '~' => true,
            '-' => debian.is_some(),
            _ => false,
        }) {
            return Err(VersionError::UpstreamVersionIllegalChar(s.to_string()));
        }

        let debian_revision = if let Some(debian) = debian {
            // Only alphanumerics and + . ~ are allowed here.
            if !debian.chars().all(|c| match c {
                c if c.is_ascii_alphanumeric() => true,
                '+' | '.' | '~' => true,
                _ => false,
            }) {
                return Err(VersionError::DebianRevisionIllegalChar(s.to_string()));
            }

            Some(debian.to_string())
        } else {
            None
        };

        Ok(Self {
            epoch,
            upstream_version: upstream.to_string(),
            debian_revision,
        })
    }

    /// The `epoch` component of the version string.
    ///
    /// Only `Some` if present in the parsed input.
    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// Assumed value of the `epoch` component.
    ///
    /// Defaults to `0` when the component is absent.
    pub fn epoch_assumed(&self) -> u32 {
        self.epoch.unwrap_or(0)
    }

    /// `upstream` component of the version string.
    pub fn upstream_version(&self) -> &str {
        &self.upstream_version
    }

    /// `debian_revision` component of the version string.
    pub fn debian_revision(&self) -> Option<&str> {
        self.debian_revision.as_deref()
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }

        write!(f, "{}", self.upstream_version)?;

        if let Some(revision) = &self.debian_revision {
            write!(f, "-{}", revision)?;
        }

        Ok(())
    }
}

/// Split a string on the first digit character.
///
/// Returns the leading non-digit run and everything afterwards. Either part
/// can be empty.
fn split_first_digit(s: &str) -> (&str, &str) {
    match s.chars().position(|c| c.is_ascii_digit()) {
        Some(0) => ("", s),
        Some(pos) => (&s[0..pos], &s[pos..]),
        None => (s, ""),
    }
}

fn split_first_nondigit(s: &str) -> (&str, &str) {
    match s.chars().position(|c| !c.is_ascii_digit()) {
        Some(0) => ("", s),
        Some(pos) => (&s[0..pos], &s[pos..]),
        None => (s, ""),
    }
}

/// Split off a leading digit run and evaluate it numerically.
///
/// Leading zeroes are insignificant and an empty run counts as zero.
fn split_leading_number(s: &str) -> (u64, &str) {
    let (digits, remaining) = split_first_nondigit(s);

    let numeric = if digits.is_empty() {
        0
    } else {
        u64::from_str(digits).unwrap_or(u64::MAX)
    };

    (numeric, remaining)
}

/// Compare two characters under the modified lexical ordering.
///
/// Tilde sorts before everything, letters sort before non-letters, and
/// within each class characters compare by ASCII value.
fn compare_char(a: char, b: char) -> Ordering {
    match (a, b) {
        (a, b) if a == b => Ordering::Equal,
        ('~', _) => Ordering::Less,
        (_, '~') => Ordering::Greater,
        (a, b) if a.is_ascii_alphabetic() && !b.is_ascii_alphabetic() => Ordering::Less,
        (a, b) if !a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => Ordering::Greater,
        (a, b) => a.cmp(&b),
    }
}

/// Compare two non-digit runs.
///
/// End of string sorts after tilde but before any other character, so a
/// shorter string is smaller unless the longer one continues with `~`.
fn lexical_compare(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars();
    let mut b_chars = b.chars();

    loop {
        match (a_chars.next(), b_chars.next()) {
            (None, None) => return Ordering::Equal,
            (Some('~'), None) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, Some('~')) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(a), Some(b)) => match compare_char(a, b) {
                Ordering::Equal => {}
                res => return res,
            },
        }
    }
}

/// Compare a version component string using Debian rules.
///
/// The comparison alternates between two steps until both inputs are
/// exhausted: the leading non-digit runs are compared lexically, then the
/// leading digit runs are compared numerically.
fn compare_component(a: &str, b: &str) -> Ordering {
    let mut a_remaining = a;
    let mut b_remaining = b;

    loop {
        let (a_nondigit, a_rest) = split_first_digit(a_remaining);
        let (b_nondigit, b_rest) = split_first_digit(b_remaining);

        match lexical_compare(a_nondigit, b_nondigit) {
            Ordering::Equal => {}
            res => return res,
        }

        let (a_numeric, a_rest) = split_leading_number(a_rest);
        let (b_numeric, b_rest) = split_leading_number(b_rest);

        match a_numeric.cmp(&b_numeric) {
            Ordering::Equal => {}
            res => return res,
        }

        if a_rest.is_empty() && b_rest.is_empty() {
            return Ordering::Equal;
        }

        a_remaining = a_rest;
        b_remaining = b_rest;
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Epoch is compared numerically, then upstream and debian components
        // via the component algorithm. An absent revision compares as `0`.
        match self.epoch_assumed().cmp(&other.epoch_assumed()) {
            Ordering::Equal => {}
            res => return res,
        }

        match compare_component(&self.upstream_version, &other.upstream_version) {
            Ordering::Equal => {}
            res => return res,
        }

        let a = self.debian_revision.as_deref().unwrap_or("0");
        let b = other.debian_revision.as_deref().unwrap_or("0");

        compare_component(a, b)
    }
}

impl PartialOrd<Self> for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() -> Result<()> {
        assert_eq!(
            PackageVersion::parse("1:4.7.0+dfsg1-2")?,
            PackageVersion {
                epoch: Some(1),
                upstream_version: "4.7.0+dfsg1".into(),
                debian_revision: Some("2".into()),
            }
        );
        assert_eq!(
            PackageVersion::parse("3.3.2.final~github")?,
            PackageVersion {
                epoch: None,
                upstream_version: "3.3.2.final~github".into(),
                debian_revision: None,
            }
        );
        assert_eq!(
            PackageVersion::parse("0.18.0+dfsg-2+b1")?,
            PackageVersion {
                epoch: None,
                upstream_version: "0.18.0+dfsg".into(),
                debian_revision: Some("2+b1".into()),
            }
        );

        assert!(matches!(
            PackageVersion::parse("1:"),
            Err(VersionError::UpstreamVersionEmpty(_))
        ));
        assert!(matches!(
            PackageVersion::parse("a:1.0"),
            Err(VersionError::EpochNonNumeric(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0-rev-with_underscore"),
            Err(VersionError::DebianRevisionIllegalChar(_))
        ));

        Ok(())
    }

    #[test]
    fn format_round_trips() -> Result<()> {
        for s in ["1:4.7.0+dfsg1-2", "3.3.2.final~github", "0.18.0+dfsg-2+b1"] {
            let v = PackageVersion::parse(s)?;
            assert_eq!(format!("{}", v), s);
        }

        Ok(())
    }

    #[test]
    fn lexical_ordering() {
        assert_eq!(lexical_compare("~", ""), Ordering::Less);
        assert_eq!(lexical_compare("", "~"), Ordering::Greater);
        assert_eq!(lexical_compare("", "a"), Ordering::Less);
        assert_eq!(lexical_compare("a", ""), Ordering::Greater);

        // Letters sort before non-letters.
        assert_eq!(lexical_compare("a", "+"), Ordering::Less);
        assert_eq!(lexical_compare("+", "a"), Ordering::Greater);

        // Within a class, ASCII order applies.
        assert_eq!(lexical_compare("a", "b"), Ordering::Less);
        assert_eq!(lexical_compare(".", "+"), Ordering::Greater);
    }

    #[test]
    fn component_ordering() {
        assert_eq!(
            compare_component("1.0~beta1~svn1245", "1.0~beta1"),
            Ordering::Less
        );
        assert_eq!(compare_component("1.0~beta1", "1.0"), Ordering::Less);
        assert_eq!(compare_component("007", "7"), Ordering::Equal);
        assert_eq!(compare_component("2.10", "2.9"), Ordering::Greater);
    }

    fn cmp(a: &str, b: &str) -> Ordering {
        PackageVersion::parse(a)
            .unwrap()
            .cmp(&PackageVersion::parse(b).unwrap())
    }

    #[test]
    fn version_ordering_laws() {
        for v in ["1.0", "1:2.3-4", "1.0~rc1-1"] {
            assert_eq!(cmp(v, v), Ordering::Equal);
        }

        // Antisymmetry.
        let samples = ["1.0", "1.0a", "1.0~rc1", "1:0", "9", "2.0-1", "2.0-2"];
        for a in samples {
            for b in samples {
                assert_eq!(cmp(a, b), cmp(b, a).reverse());
            }
        }

        // Tilde sorts before the end of a part.
        assert_eq!(cmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(cmp("1.0", "1.0a"), Ordering::Less);

        // Epoch dominates everything else.
        assert_eq!(cmp("1:0", "9"), Ordering::Greater);

        // Absent revision compares as zero.
        assert_eq!(cmp("1.0", "1.0-0"), Ordering::Equal);
        assert_eq!(cmp("1.0-1", "1.0"), Ordering::Greater);
    }
}
