//! Referenced-entity checks: each reference resolves to its entity or
//! yields one field error naming what could not be found.

use std::sync::Arc;

use update_gate_core::{
    AclBackendKind, AdmissionConfig, BugFeedback, ErrorKind, Location, Mode, Pipeline,
    SuggestedStatus, Submission, TestCaseFeedback, ValidationContext,
};
use update_gate_services::StaticTagService;
use update_gate_state::{
    Bug, Build, Comment, Group, MemoryDomainStore, Package, Release, Stack, StoreFixtures,
    TestCase, Update, UpdateStatus, User,
};

fn fixtures() -> StoreFixtures {
    StoreFixtures {
        releases: vec![
            Release::conventional("F30", "30", "f30"),
            Release::conventional("F29", "29", "f29"),
        ],
        packages: vec![Package::new("foo"), Package::new("bar")],
        builds: vec![Build::new("bar-1-1.fc30", "bar").with_release("F30")],
        updates: vec![Update {
            title: "foo-1.0-1.fc30".to_string(),
            alias: Some("FEDORA-2019-0001".to_string()),
            status: UpdateStatus::Testing,
            request: None,
            builds: vec!["foo-1.0-1.fc30".to_string()],
            release: "F30".to_string(),
        }],
        users: vec![User::new("ralph")],
        groups: vec![Group {
            name: "packager".to_string(),
        }],
        comments: vec![Comment {
            id: 7,
            update: "foo-1.0-1.fc30".to_string(),
            author: "ralph".to_string(),
            text: "works for me".to_string(),
        }],
        bugs: vec![
            Bug {
                bug_id: 100,
                updates: vec!["foo-1.0-1.fc30".to_string()],
            },
            Bug {
                bug_id: 200,
                updates: vec![],
            },
        ],
        testcases: vec![
            TestCase {
                name: "depcheck".to_string(),
                package: "foo".to_string(),
            },
            TestCase {
                name: "rpmlint".to_string(),
                package: "bar".to_string(),
            },
        ],
        stacks: vec![Stack {
            name: "gnome".to_string(),
            packages: vec!["foo".to_string()],
        }],
    }
}

fn pipeline() -> Pipeline {
    let store = MemoryDomainStore::from_fixtures(fixtures()).unwrap();
    let koji = StaticTagService::new()
        .with_build("foo-2.0-1.fc30", &["f30-updates-candidate"])
        .with_build("qux-1-1.fc30", &["f30-updates"])
        .with_build("bar-1-1.fc30", &["f30-updates"])
        .with_tag("f30-override");
    let config = AdmissionConfig {
        acl_backend: AclBackendKind::None,
        ..AdmissionConfig::default()
    };
    Pipeline::builder(Arc::new(store), Arc::new(koji))
        .config(config)
        .build()
        .unwrap()
}

async fn check(submission: Submission) -> ValidationContext {
    pipeline()
        .run(Mode::New, submission, Some(User::new("ralph")))
        .await
        .unwrap()
}

fn names(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(|v| v.to_string()).collect())
}

#[tokio::test]
async fn known_packages_resolve() {
    let ctx = check(Submission {
        packages: names(&["foo", "bar"]),
        ..Submission::default()
    })
    .await;

    assert!(ctx.is_valid(), "unexpected errors: {:?}", ctx.errors());
    let resolved = ctx.validated.packages.as_ref().and_then(|p| p.resolved());
    assert_eq!(resolved.map(|p| p.len()), Some(2));
}

#[tokio::test]
async fn unknown_packages_are_listed_in_one_error() {
    let ctx = check(Submission {
        packages: names(&["foo", "nope", "gone"]),
        ..Submission::default()
    })
    .await;

    assert_eq!(ctx.errors().len(), 1);
    let err = &ctx.errors()[0];
    assert_eq!(err.location, Location::Querystring);
    assert_eq!(err.field, "packages");
    assert_eq!(err.kind, ErrorKind::InvalidReference);
    assert_eq!(err.message, "Invalid packages specified: nope, gone");
}

#[tokio::test]
async fn updates_resolve_by_title_or_alias_and_releases_by_version() {
    let ctx = check(Submission {
        updates: names(&["foo-1.0-1.fc30", "FEDORA-2019-0001"]),
        releases: names(&["F29", "30"]),
        release: Some("F30".to_string()),
        groups: names(&["packager"]),
        user: Some("ralph".to_string()),
        ..Submission::default()
    })
    .await;

    assert!(ctx.is_valid(), "unexpected errors: {:?}", ctx.errors());
    let releases = ctx
        .validated
        .releases
        .as_ref()
        .and_then(|r| r.resolved())
        .unwrap();
    let release_names: Vec<&str> = releases.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(release_names, vec!["F29", "F30"]);
}

#[tokio::test]
async fn independent_failures_are_all_reported() {
    let ctx = check(Submission {
        packages: names(&["nope"]),
        user: Some("nobody".to_string()),
        update_owner: Some("ghost".to_string()),
        stack: Some("kde".to_string()),
        ..Submission::default()
    })
    .await;

    let fields: Vec<&str> = ctx.errors().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["packages", "user", "update_owner", "stack"]);
    assert_eq!(ctx.errors()[1].message, "Invalid user specified: nobody");
    assert_eq!(ctx.status(), Some(SuggestedStatus::NotFound));
}

#[tokio::test]
async fn update_in_url_must_exist() {
    let ctx = check(Submission {
        update: Some("FEDORA-2019-9999".to_string()),
        ..Submission::default()
    })
    .await;

    let err = &ctx.errors()[0];
    assert_eq!(err.location, Location::Url);
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(ctx.status().map(|s| s.code()), Some(404));

    let ctx = check(Submission {
        update: Some("FEDORA-2019-0001".to_string()),
        ..Submission::default()
    })
    .await;
    assert!(ctx.is_valid());
    let update = ctx.validated.update.as_ref().and_then(|u| u.resolved());
    assert_eq!(update.map(|u| u.title.as_str()), Some("foo-1.0-1.fc30"));
}

#[tokio::test]
async fn comment_ids_must_be_integers_that_exist() {
    let ctx = check(Submission {
        comment_id: Some("seven".to_string()),
        ..Submission::default()
    })
    .await;
    assert_eq!(ctx.errors()[0].message, "Comment id must be an int");
    assert_eq!(ctx.status(), Some(SuggestedStatus::BadRequest));

    let ctx = check(Submission {
        comment_id: Some("8".to_string()),
        ..Submission::default()
    })
    .await;
    assert_eq!(ctx.errors()[0].kind, ErrorKind::NotFound);
    assert_eq!(ctx.status(), Some(SuggestedStatus::NotFound));

    let ctx = check(Submission {
        comment_id: Some("7".to_string()),
        ..Submission::default()
    })
    .await;
    assert!(ctx.is_valid());
    assert_eq!(ctx.validated.comment.map(|c| c.author), Some("ralph".to_string()));
}

#[tokio::test]
async fn bug_feedback_must_name_linked_bugs() {
    let feedback = |ids: &[i64]| {
        ids.iter()
            .map(|id| BugFeedback {
                bug_id: *id,
                karma: 1,
            })
            .collect::<Vec<_>>()
    };

    let ctx = check(Submission {
        update_id: Some("FEDORA-2019-0001".to_string()),
        bug_feedback: Some(feedback(&[100])),
        ..Submission::default()
    })
    .await;
    assert!(ctx.is_valid(), "unexpected errors: {:?}", ctx.errors());

    let ctx = check(Submission {
        update_id: Some("FEDORA-2019-0001".to_string()),
        bug_feedback: Some(feedback(&[100, 200, 300])),
        ..Submission::default()
    })
    .await;
    assert_eq!(ctx.errors().len(), 1);
    assert_eq!(ctx.errors()[0].message, "Invalid bug ids specified: 200, 300");
}

#[tokio::test]
async fn feedback_without_an_update_is_not_found() {
    let ctx = check(Submission {
        bug_feedback: Some(vec![BugFeedback {
            bug_id: 100,
            karma: 1,
        }]),
        ..Submission::default()
    })
    .await;

    assert_eq!(ctx.errors()[0].message, "Invalid update");
    assert_eq!(ctx.status(), Some(SuggestedStatus::NotFound));
}

#[tokio::test]
async fn testcase_feedback_must_match_update_packages() {
    let feedback = |names: &[&str]| {
        names
            .iter()
            .map(|name| TestCaseFeedback {
                testcase_name: name.to_string(),
                karma: -1,
            })
            .collect::<Vec<_>>()
    };

    let ctx = check(Submission {
        update: Some("foo-1.0-1.fc30".to_string()),
        testcase_feedback: Some(feedback(&["depcheck"])),
        ..Submission::default()
    })
    .await;
    assert!(ctx.is_valid(), "unexpected errors: {:?}", ctx.errors());

    let ctx = check(Submission {
        update: Some("foo-1.0-1.fc30".to_string()),
        testcase_feedback: Some(feedback(&["depcheck", "rpmlint"])),
        ..Submission::default()
    })
    .await;
    assert_eq!(
        ctx.errors()[0].message,
        "Invalid testcase names specified: rpmlint"
    );
}

#[tokio::test]
async fn feedback_karma_is_a_single_vote() {
    let ctx = check(Submission {
        update_id: Some("FEDORA-2019-0001".to_string()),
        bug_feedback: Some(vec![BugFeedback {
            bug_id: 100,
            karma: 5,
        }]),
        ..Submission::default()
    })
    .await;
    assert_eq!(ctx.errors().len(), 1);
    let err = &ctx.errors()[0];
    assert_eq!(err.location, Location::Body);
    assert_eq!(err.field, "bug_feedback");
    assert_eq!(err.kind, ErrorKind::InvalidReference);
    assert_eq!(err.message, "Invalid karma 5 for bug 100. Must be -1, 0 or 1");

    let ctx = check(Submission {
        update: Some("foo-1.0-1.fc30".to_string()),
        testcase_feedback: Some(vec![
            TestCaseFeedback {
                testcase_name: "depcheck".to_string(),
                karma: 0,
            },
            TestCaseFeedback {
                testcase_name: "depcheck".to_string(),
                karma: -2,
            },
        ]),
        ..Submission::default()
    })
    .await;
    assert_eq!(ctx.errors().len(), 1);
    assert_eq!(ctx.errors()[0].field, "testcase_feedback");
    assert_eq!(
        ctx.errors()[0].message,
        "Invalid karma -2 for test case depcheck. Must be -1, 0 or 1"
    );
}

#[tokio::test]
async fn override_build_is_prepared_with_its_release() {
    let ctx = check(Submission {
        nvr: Some("foo-2.0-1.fc30".to_string()),
        ..Submission::default()
    })
    .await;

    assert!(ctx.is_valid(), "unexpected errors: {:?}", ctx.errors());
    let build = ctx.validated.build.as_ref().unwrap();
    assert_eq!(build.package, "foo");
    assert_eq!(build.release.as_deref(), Some("F30"));
}

#[tokio::test]
async fn override_build_needs_a_promotable_tag() {
    let unknown = check(Submission {
        nvr: Some("qux-1-1.fc30".to_string()),
        ..Submission::default()
    })
    .await;
    assert_eq!(unknown.errors()[0].kind, ErrorKind::ReleaseInferenceError);
    assert_eq!(unknown.errors()[0].message, "Invalid build");

    let stable_only = check(Submission {
        nvr: Some("bar-1-1.fc30".to_string()),
        ..Submission::default()
    })
    .await;
    assert_eq!(stable_only.errors()[0].kind, ErrorKind::TagMismatch);
    assert!(stable_only.validated.build.is_none());

    let malformed = check(Submission {
        nvr: Some("qux".to_string()),
        ..Submission::default()
    })
    .await;
    assert_eq!(malformed.errors()[0].kind, ErrorKind::FormatError);
}

#[tokio::test]
async fn release_tag_fields_must_name_known_tags() {
    let ctx = check(Submission {
        candidate_tag: Some("f30-updates-candidate".to_string()),
        override_tag: Some("f30-override".to_string()),
        testing_tag: Some("f31-updates-testing".to_string()),
        ..Submission::default()
    })
    .await;

    assert_eq!(ctx.errors().len(), 1);
    let err = &ctx.errors()[0];
    assert_eq!(err.field, "testing_tag");
    assert_eq!(err.message, "Invalid tag: f31-updates-testing");
    assert_eq!(ctx.validated.release_tags.len(), 2);
}
