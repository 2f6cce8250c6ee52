//! NVR parsing and RPM label ordering over generated grids.

use std::cmp::Ordering;

use update_gate_core::{rpmvercmp, Nvr};

fn names() -> Vec<&'static str> {
    vec!["foo", "python-requests", "kernel-tools-libs", "a"]
}

fn labels() -> Vec<String> {
    let mut out = Vec::new();
    for major in ["0", "1", "2", "10", "010"] {
        for minor in ["", ".0", ".1", ".a", ".1a", "~rc1", "^post1"] {
            out.push(format!("{}{}", major, minor));
        }
    }
    out.extend(["a", "b", "alpha", "1.0~~", "1.0~", "1_0", "1..0"].map(String::from));
    out
}

#[test]
fn parse_then_format_is_identity() {
    for name in names() {
        for version in ["1.0", "2.3.4", "0.1~beta"] {
            for release in ["1.fc30", "0.2.rc1.el8", "3"] {
                let build = format!("{}-{}-{}", name, version, release);
                let nvr = Nvr::parse(&build).unwrap();
                assert_eq!(nvr.name, name);
                assert_eq!(nvr.version, version);
                assert_eq!(nvr.release, release);
                assert_eq!(nvr.to_string(), build);
            }
        }
    }
}

#[test]
fn builds_missing_a_part_are_rejected() {
    for bad in ["", "foo", "foo-1.0", "-1.0-1", "foo--1", "foo-1.0-", "--"] {
        let err = Nvr::parse(bad).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Build not in name-version-release format: {}", bad)
        );
    }
}

#[test]
fn comparison_is_reflexive_and_antisymmetric() {
    let labels = labels();
    for a in &labels {
        assert_eq!(rpmvercmp(a, a), Ordering::Equal, "{} vs itself", a);
        for b in &labels {
            assert_eq!(
                rpmvercmp(a, b),
                rpmvercmp(b, a).reverse(),
                "{} vs {}",
                a,
                b
            );
        }
    }
}

#[test]
fn comparison_is_transitive() {
    let labels = labels();
    for a in &labels {
        for b in &labels {
            for c in &labels {
                if rpmvercmp(a, b) != Ordering::Greater && rpmvercmp(b, c) != Ordering::Greater {
                    assert_ne!(
                        rpmvercmp(a, c),
                        Ordering::Greater,
                        "{} <= {} <= {} but {} > {}",
                        a,
                        b,
                        c,
                        a,
                        c
                    );
                }
            }
        }
    }
}

#[test]
fn known_orderings() {
    let cases = [
        ("1.0", "1.0", Ordering::Equal),
        ("1.0", "2.0", Ordering::Less),
        ("2.0.1", "2.0", Ordering::Greater),
        ("10", "9", Ordering::Greater),
        ("010", "10", Ordering::Equal),
        ("1.0a", "1.0", Ordering::Greater),
        ("1.0", "1.0b", Ordering::Less),
        ("1.a", "1.1", Ordering::Less),
        ("1.0~rc1", "1.0", Ordering::Less),
        ("1.0~rc1", "1.0~rc2", Ordering::Less),
        ("1.0~~", "1.0~", Ordering::Less),
        ("1_0", "1.0", Ordering::Equal),
        ("fc30", "fc29", Ordering::Greater),
    ];
    for (a, b, expected) in cases {
        assert_eq!(rpmvercmp(a, b), expected, "{} vs {}", a, b);
    }
}

#[test]
fn release_breaks_version_ties() {
    let older = Nvr::parse("foo-1.0-1.fc30").unwrap();
    let newer = Nvr::parse("foo-1.0-2.fc30").unwrap();
    let bumped = Nvr::parse("foo-1.1-0.fc30").unwrap();

    assert_eq!(older.label_cmp(&newer), Ordering::Less);
    assert_eq!(newer.label_cmp(&bumped), Ordering::Less);
    assert_eq!(bumped.label_cmp(&older), Ordering::Greater);
}
