//! Contract tests for DomainStore.
//!
//! The same behavioral checks run against the in-memory fake and the
//! SurrealDB backend. Any conforming implementation must pass these.

use std::sync::Arc;
use std::time::Duration;

use update_gate_state::fakes::release_created_after;
use update_gate_state::*;

fn sample_update() -> Update {
    Update {
        title: "foo-1.0-1.fc30".to_string(),
        alias: Some("FEDORA-2019-abc123".to_string()),
        status: UpdateStatus::Testing,
        request: None,
        builds: vec!["foo-1.0-1.fc30".to_string()],
        release: "F30".to_string(),
    }
}

fn sample_comment() -> Comment {
    Comment {
        id: 42,
        update: "foo-1.0-1.fc30".to_string(),
        author: "ralph".to_string(),
        text: "works for me".to_string(),
    }
}

async fn seed_memory() -> MemoryDomainStore {
    let store = MemoryDomainStore::new();
    store
        .insert_release(Release::conventional("F30", "30", "f30"))
        .unwrap();
    store
        .insert_release(release_created_after(
            Release::conventional("F31", "31", "f31"),
            10,
        ))
        .unwrap();
    store
        .insert_build(Build::new("foo-1.0-1.fc30", "foo").attached_to("foo-1.0-1.fc30"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    store
        .insert_build(Build::new("foo-1.1-1.fc30", "foo"))
        .unwrap();
    store.insert_update(sample_update()).unwrap();
    store
        .insert_user(User::new("ralph").in_groups(&["packager"]))
        .unwrap();
    store.insert_comment(sample_comment()).unwrap();
    store
        .insert_bug(Bug {
            bug_id: 1234,
            updates: vec!["foo-1.0-1.fc30".to_string()],
        })
        .unwrap();
    store
        .insert_testcase(TestCase {
            name: "QA:Testcase_foo".to_string(),
            package: "foo".to_string(),
        })
        .unwrap();
    store
        .insert_stack(Stack {
            name: "GNOME".to_string(),
            packages: vec!["gnome-shell".to_string()],
        })
        .unwrap();
    store
}

async fn seed_surreal() -> SurrealDomainStore {
    let handle = Arc::new(SurrealHandle::setup_db().await.unwrap());
    handle
        .insert_release(Release::conventional("F30", "30", "f30"))
        .await
        .unwrap();
    handle
        .insert_release(release_created_after(
            Release::conventional("F31", "31", "f31"),
            10,
        ))
        .await
        .unwrap();
    handle
        .insert_build(Build::new("foo-1.0-1.fc30", "foo").attached_to("foo-1.0-1.fc30"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    handle
        .insert_build(Build::new("foo-1.1-1.fc30", "foo"))
        .await
        .unwrap();
    handle.insert_update(sample_update()).await.unwrap();
    handle
        .insert_user(User::new("ralph").in_groups(&["packager"]))
        .await
        .unwrap();
    handle
        .insert_group(Group {
            name: "packager".to_string(),
        })
        .await
        .unwrap();
    handle.insert_comment(sample_comment()).await.unwrap();
    handle
        .insert_bug(Bug {
            bug_id: 1234,
            updates: vec!["foo-1.0-1.fc30".to_string()],
        })
        .await
        .unwrap();
    handle
        .insert_testcase(TestCase {
            name: "QA:Testcase_foo".to_string(),
            package: "foo".to_string(),
        })
        .await
        .unwrap();
    handle
        .insert_stack(Stack {
            name: "GNOME".to_string(),
            packages: vec!["gnome-shell".to_string()],
        })
        .await
        .unwrap();
    SurrealDomainStore::new(handle)
}

async fn assert_store_contract(store: &dyn DomainStore) {
    let releases = store.releases().await.unwrap();
    assert_eq!(releases.len(), 2);

    let f30 = store.release_by_name("F30").await.unwrap().unwrap();
    assert_eq!(f30.candidate_tag, "f30-updates-candidate");
    assert!(store.release_by_name("F99").await.unwrap().is_none());

    let by_version = store.release_by_name_or_version("31").await.unwrap().unwrap();
    assert_eq!(by_version.name, "F31");

    let latest = store.latest_build_for_package("foo").await.unwrap().unwrap();
    assert_eq!(latest.nvr, "foo-1.1-1.fc30");
    assert!(store.latest_build_for_package("bar").await.unwrap().is_none());

    let attached = store.build_by_nvr("foo-1.0-1.fc30").await.unwrap().unwrap();
    assert_eq!(attached.update.as_deref(), Some("foo-1.0-1.fc30"));

    let by_alias = store
        .update_by_title_or_alias("FEDORA-2019-abc123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_alias.title, "foo-1.0-1.fc30");
    assert_eq!(by_alias.status, UpdateStatus::Testing);
    assert!(store.update_by_title("FEDORA-2019-abc123").await.unwrap().is_none());

    let user = store.user_by_name("ralph").await.unwrap().unwrap();
    assert!(user.groups.contains("packager"));
    assert!(store.group_by_name("packager").await.unwrap().is_some());

    assert_eq!(store.comment_by_id(42).await.unwrap().unwrap().author, "ralph");
    assert!(store.comment_by_id(7).await.unwrap().is_none());
    assert_eq!(store.bug_by_id(1234).await.unwrap().unwrap().updates.len(), 1);
    assert!(store.testcase_by_name("QA:Testcase_foo").await.unwrap().is_some());
    assert!(store.stack_by_name("GNOME").await.unwrap().is_some());
    assert!(store.stack_by_name("KDE").await.unwrap().is_none());
}

async fn assert_get_or_create_is_idempotent(store: &dyn DomainStore) {
    assert!(store.package_by_name("newpkg").await.unwrap().is_none());
    let first = store.get_or_create_package("newpkg").await.unwrap();
    let second = store.get_or_create_package("newpkg").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        store.package_by_name("newpkg").await.unwrap().unwrap().name,
        "newpkg"
    );
}

#[tokio::test]
async fn memory_store_satisfies_contract() {
    let store = seed_memory().await;
    assert_store_contract(&store).await;
    assert_get_or_create_is_idempotent(&store).await;
}

#[tokio::test]
async fn surreal_store_satisfies_contract() {
    let store = seed_surreal().await;
    assert_store_contract(&store).await;
    assert_get_or_create_is_idempotent(&store).await;
}

#[tokio::test]
async fn memory_get_or_create_under_concurrency_creates_one_row() {
    let store = Arc::new(MemoryDomainStore::new());
    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.get_or_create_package("racy").await.unwrap()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap().name, "racy");
    }
    assert_eq!(store.package_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn surreal_get_or_create_under_concurrency_creates_one_row() {
    let handle = Arc::new(SurrealHandle::setup_db().await.unwrap());
    let store = Arc::new(SurrealDomainStore::new(Arc::clone(&handle)));
    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.get_or_create_package("racy").await.unwrap()
        }));
    }
    let mut created = Vec::new();
    for h in handles {
        created.push(h.await.unwrap());
    }
    assert!(created.iter().all(|p| p == &created[0]));
    assert_eq!(created[0].name, "racy");
    assert_eq!(
        store.package_by_name("racy").await.unwrap().map(|p| p.name),
        Some("racy".to_string())
    );
    assert_eq!(handle.package_count().await.unwrap(), 1);
}

#[tokio::test]
async fn memory_store_rejects_duplicate_seed_rows() {
    let store = MemoryDomainStore::new();
    store
        .insert_release(Release::conventional("F30", "30", "f30"))
        .unwrap();
    let err = store
        .insert_release(Release::conventional("F30", "30", "f30"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { table: "releases", .. }));
}

#[test]
fn fixtures_load_from_json() {
    let json = serde_json::json!({
        "releases": [Release::conventional("F30", "30", "f30")],
        "users": [{ "name": "bob", "groups": ["qa"] }],
        "builds": [{
            "nvr": "bar-2.0-1.fc30",
            "package": "bar",
            "release": "F30",
            "update": null,
            "created_at": "2019-05-01T00:00:00Z"
        }]
    });
    let fixtures: StoreFixtures = serde_json::from_value(json).unwrap();
    let store = MemoryDomainStore::from_fixtures(fixtures).unwrap();
    assert_eq!(store.package_count(), 1);
}
