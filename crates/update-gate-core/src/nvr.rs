//! Build identifier codec.
//!
//! A build is named `name-version-release`. The name may itself contain
//! hyphens, so parsing splits on the *last* two. Versions and releases are
//! ordered with RPM label semantics (see [`rpmvercmp`]).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NvrError {
    #[error("Build not in name-version-release format: {0}")]
    Format(String),
}

/// A parsed `name-version-release` triple. All parts are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nvr {
    pub name: String,
    pub version: String,
    pub release: String,
}

impl Nvr {
    pub fn parse(build: &str) -> Result<Self, NvrError> {
        let mut parts = build.rsplitn(3, '-');
        let release = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();

        if name.is_empty() || version.is_empty() || release.is_empty() {
            return Err(NvrError::Format(build.to_string()));
        }

        Ok(Nvr {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
        })
    }

    /// Order two builds by version, then release. The package name does
    /// not take part.
    pub fn label_cmp(&self, other: &Nvr) -> Ordering {
        rpmvercmp(&self.version, &other.version)
            .then_with(|| rpmvercmp(&self.release, &other.release))
    }
}

impl FromStr for Nvr {
    type Err = NvrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Nvr::parse(s)
    }
}

impl fmt::Display for Nvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.release)
    }
}

/// Compare two version or release labels the way RPM does.
///
/// Labels are split into alternating runs of digits and letters; any other
/// character only separates runs. Digit runs compare numerically (leading
/// zeros ignored), letter runs compare bytewise, and a digit run beats a
/// letter run. `~` sorts before anything, including the end of the label,
/// so `1.0~rc1 < 1.0`. When every shared run is equal the label with runs
/// left over is greater.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        match (one.first() == Some(&b'~'), two.first() == Some(&b'~')) {
            (true, true) => {
                one = &one[1..];
                two = &two[1..];
                continue;
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg_one, rest_one) = split_run(one, numeric);
        let (seg_two, rest_two) = split_run(two, numeric);
        one = rest_one;
        two = rest_two;

        // Runs of different kinds: the numeric one is newer.
        if seg_two.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ordering = if numeric {
            let seg_one = strip_leading_zeros(seg_one);
            let seg_two = strip_leading_zeros(seg_two);
            seg_one
                .len()
                .cmp(&seg_two.len())
                .then_with(|| seg_one.cmp(seg_two))
        } else {
            seg_one.cmp(seg_two)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|c| c.is_ascii_alphanumeric() || *c == b'~')
        .unwrap_or(s.len());
    &s[start..]
}

fn split_run(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|c| *c != b'0').unwrap_or(s.len());
    &s[start..]
}
