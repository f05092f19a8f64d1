//! Integration tests driving the directory client against the reference store.
//!
//! Every test loads a fresh copy of `tests/fixtures/principals.csv`.

use krbdir_client::{NameFilter, SearchPage, Session};
use krbdir_core::{
    Error, FieldMask, PrincipalFlag, PrincipalFlags, PrincipalName, PrincipalSeed, SessionConfig,
};
use krbdir_memstore::{ReferenceStore, StoreConfig};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;

const REALM: &str = "EXAMPLE.COM";

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("principals.csv")
}

fn load_store() -> ReferenceStore {
    let config = StoreConfig::new(fixture_path());
    ReferenceStore::open(&config).unwrap_or_else(|e| {
        panic!(
            "Failed to load fixture at {}: {}",
            fixture_path().display(),
            e
        )
    })
}

fn admin_config() -> SessionConfig {
    SessionConfig::new("admin/admin").with_password("adminpw")
}

async fn open_session(store: &ReferenceStore) -> Session {
    Session::init(Arc::new(store.clone()), &admin_config())
        .await
        .expect("admin session")
}

fn names(page: &SearchPage) -> Vec<String> {
    page.principals
        .iter()
        .map(|p| p.name.name().to_string())
        .collect()
}

#[tokio::test]
async fn session_discovers_store_realm() {
    let store = load_store();
    let session = open_session(&store).await;
    assert_eq!(session.realm(), Some(REALM));
}

#[tokio::test]
async fn wrong_password_is_auth_error() {
    let store = load_store();
    let config = SessionConfig::new("admin/admin").with_password("wrong");
    let err = Session::init(Arc::new(store), &config).await.unwrap_err();
    assert!(matches!(err, Error::AuthError(_)));
}

#[tokio::test]
async fn keytab_login_succeeds() {
    let store = load_store();
    let config = SessionConfig::new("admin/admin@EXAMPLE.COM").with_keytab("/etc/krb5.keytab");
    assert!(Session::init(Arc::new(store), &config).await.is_ok());
}

#[tokio::test]
async fn created_principal_reads_back_masked_fields() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    let seed = PrincipalSeed::new("carol")
        .with_policy("default")
        .with_attributes(PrincipalFlags::REQUIRES_PREAUTH)
        .with_expiration(chrono::Utc::now());
    client
        .create(
            &seed,
            FieldMask::POLICY | FieldMask::ATTRIBUTES,
            Some(SecretString::from("carolpw".to_string())),
        )
        .await
        .unwrap();

    let carol = client.get("carol").await.unwrap();
    assert_eq!(carol.name, PrincipalName::new("carol", REALM));
    assert_eq!(carol.policy.as_deref(), Some("default"));
    assert_eq!(carol.attributes, PrincipalFlags::REQUIRES_PREAUTH);
    assert!(carol.expiration.is_none());
    assert!(carol.password_expiration.is_none());
    assert!(carol.max_ticket_life.is_none());
    assert_eq!(
        carol.modified_by,
        Some(PrincipalName::new("admin/admin", REALM))
    );
    assert!(carol.modified_at.is_some());
    assert!(store.verify_secret(&carol.name, "carolpw"));
}

#[tokio::test]
async fn modify_attributes_leaves_other_fields() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    let before = client.get("alice").await.unwrap();
    let flags = before
        .attributes
        .with_flag(PrincipalFlag::AllowTix, false);
    let seed = PrincipalSeed::new("alice")
        .with_attributes(flags)
        .with_policy("ignored");
    client.modify(&seed, FieldMask::ATTRIBUTES).await.unwrap();

    let after = client.get("alice").await.unwrap();
    assert_eq!(after.attributes, flags);
    assert!(!after.is_enabled());
    assert_eq!(after.policy, before.policy);
    assert_eq!(after.expiration, before.expiration);
    assert!(after.modified_at >= before.modified_at);
}

#[tokio::test]
async fn modify_policy_without_value_clears_it() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    client
        .modify(&PrincipalSeed::new("bob"), FieldMask::POLICY)
        .await
        .unwrap();
    assert!(client.get("bob").await.unwrap().policy.is_none());
}

#[tokio::test]
async fn modify_missing_principal_is_not_found() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let err = session
        .client()
        .modify(&PrincipalSeed::new("ghost"), FieldMask::ATTRIBUTES)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn second_delete_is_not_found() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    client.delete("bob").await.unwrap();
    assert!(matches!(
        client.delete("bob").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn create_delete_get_round_trip() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    client
        .create(&PrincipalSeed::new("temp"), FieldMask::empty(), None)
        .await
        .unwrap();
    client.delete("temp").await.unwrap();
    assert!(matches!(
        client.get("temp").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn create_duplicate_is_already_exists() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let err = session
        .client()
        .create(&PrincipalSeed::new("alice"), FieldMask::empty(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
}

#[tokio::test]
async fn create_in_foreign_realm_is_bad_realm() {
    let store = load_store();
    let before = store.len();
    let mut session = open_session(&store).await;

    let err = session
        .client()
        .create(
            &PrincipalSeed::new("carol@OTHER.ORG"),
            FieldMask::empty(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRealm(_)));
    assert_eq!(store.len(), before);
}

#[tokio::test]
async fn create_beyond_capacity() {
    let store = ReferenceStore::open(&StoreConfig::new(fixture_path()).with_capacity(9)).unwrap();
    assert_eq!(store.len(), 9);
    let mut session = open_session(&store).await;

    let err = session
        .client()
        .create(&PrincipalSeed::new("one-too-many"), FieldMask::empty(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded(_)));
}

#[tokio::test]
async fn rename_onto_existing_changes_nothing() {
    let store = load_store();
    let before = store.snapshot();
    let mut session = open_session(&store).await;

    let err = session.client().rename("alice", "bob").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    let after = store.snapshot();
    assert_eq!(after, before);
    assert_eq!(
        after.iter().map(|p| &p.policy).collect::<Vec<_>>(),
        before.iter().map(|p| &p.policy).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn rename_missing_is_not_found() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let err = session.client().rename("ghost", "spirit").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn rename_moves_record() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    client.rename("bob", "robert").await.unwrap();
    let robert = client.get("robert").await.unwrap();
    assert_eq!(robert.policy.as_deref(), Some("default"));
    assert!(matches!(client.get("bob").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn change_credential() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    let secret = SecretString::from("rotated".to_string());
    client.change_credential("svc/backup", &secret).await.unwrap();
    assert!(store.verify_secret(&PrincipalName::new("svc/backup", REALM), "rotated"));

    assert!(matches!(
        client.change_credential("ghost", &secret).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn paginates_five_matches() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    let first = client.search(Some("host/*"), 2, 0).await.unwrap().unwrap();
    assert_eq!(names(&first), ["host/web1", "host/web2"]);
    assert_eq!(first.remaining, 3);

    let last = client.search(Some("host/*"), 2, 4).await.unwrap().unwrap();
    assert_eq!(names(&last), ["host/mail"]);
    assert_eq!(last.remaining, 0);

    let end = client.search(Some("host/*"), 2, 5).await.unwrap().unwrap();
    assert!(end.principals.is_empty());
    assert_eq!(end.remaining, 0);

    assert!(client.search(Some("host/*"), 2, 6).await.unwrap().is_none());
}

#[tokio::test]
async fn unbounded_search_returns_everything() {
    let store = load_store();
    let mut session = open_session(&store).await;

    let page = session.client().search(None, 0, 0).await.unwrap().unwrap();
    assert_eq!(page.principals.len(), store.len());
    assert_eq!(page.remaining, 0);
    assert_eq!(page.principals, store.snapshot());
}

#[tokio::test]
async fn exact_search() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    let hit = client.search(Some("alice"), 10, 0).await.unwrap().unwrap();
    assert_eq!(names(&hit), ["alice"]);

    let miss = client.search(Some("ghost"), 10, 0).await.unwrap().unwrap();
    assert!(miss.principals.is_empty());
    assert_eq!(miss.remaining, 0);
}

#[tokio::test]
async fn wildcard_queries_follow_shell_rules() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    let hosts = client.search(Some("host/**"), 0, 0).await.unwrap().unwrap();
    assert_eq!(hosts.principals.len(), 5);

    let dbs = client.search(Some("host/db?"), 0, 0).await.unwrap().unwrap();
    assert_eq!(names(&dbs), ["host/db1", "host/db2"]);

    let none = client.search(Some("a[*"), 0, 0).await.unwrap().unwrap();
    assert!(none.principals.is_empty());
    assert_eq!(none.remaining, 0);
}

#[tokio::test]
async fn name_filters_search_natively() {
    let store = load_store();
    let mut session = open_session(&store).await;
    let mut client = session.client();

    let query = NameFilter::Contains("web".to_string()).to_query();
    let page = client.search(query.as_deref(), 0, 0).await.unwrap().unwrap();
    assert_eq!(names(&page), ["host/web1", "host/web2"]);

    let query = NameFilter::Equals("alice".to_string()).to_query();
    let page = client.search(query.as_deref(), 0, 0).await.unwrap().unwrap();
    assert_eq!(names(&page), ["alice"]);

    let query = NameFilter::StartsWith("host/".to_string()).negate().to_query();
    assert!(query.is_none());
    let page = client.search(query.as_deref(), 0, 0).await.unwrap().unwrap();
    assert_eq!(page.principals.len(), store.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_see_whole_operations() {
    const WORKERS: usize = 4;
    const PER_WORKER: usize = 10;

    let store = load_store();
    let before = store.snapshot();

    let mut tasks = Vec::new();
    for worker in 0..WORKERS {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let mut session = open_session(&store).await;
            let mut client = session.client();
            for i in 0..PER_WORKER {
                let name = format!("w{worker}-{i}");
                client
                    .create(&PrincipalSeed::new(name.as_str()), FieldMask::empty(), None)
                    .await
                    .unwrap();
                client
                    .rename(&name, &format!("{name}-renamed"))
                    .await
                    .unwrap();
            }
            client.rename("alice", &format!("alice-{worker}")).await.is_ok()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let after = store.snapshot();
    assert_eq!(after.len(), before.len() + WORKERS * PER_WORKER);

    let after_names = after.iter().map(|p| p.name.name()).collect::<Vec<_>>();
    let unique = after_names
        .iter()
        .collect::<std::collections::HashSet<_>>();
    assert_eq!(unique.len(), after_names.len());
    assert_eq!(
        after_names
            .iter()
            .filter(|name| name.starts_with("alice-"))
            .count(),
        1
    );

    let fixture_part = after_names[..before.len()]
        .iter()
        .map(|&name| if name.starts_with("alice-") { "alice" } else { name })
        .collect::<Vec<_>>();
    let before_names = before.iter().map(|p| p.name.name()).collect::<Vec<_>>();
    assert_eq!(fixture_part, before_names);

    for worker in 0..WORKERS {
        let prefix = format!("w{worker}-");
        let order = after_names
            .iter()
            .filter(|name| name.starts_with(&prefix))
            .copied()
            .collect::<Vec<_>>();
        let expected = (0..PER_WORKER)
            .map(|i| format!("w{worker}-{i}-renamed"))
            .collect::<Vec<_>>();
        assert_eq!(order, expected);
    }
}

#[tokio::test]
async fn renew_and_destroy() {
    let store = load_store();
    let mut session = open_session(&store).await;

    let err = session
        .renew(&SessionConfig::new("admin/admin").with_password("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthError(_)));
    assert!(matches!(
        session.client().get("alice").await,
        Err(Error::AuthError(_))
    ));

    session.renew(&admin_config()).await.unwrap();
    assert!(session.client().get("alice").await.is_ok());

    session.destroy().await;
    session.destroy().await;
    assert!(matches!(
        session.client().get("alice").await,
        Err(Error::AuthError(_))
    ));
}

#[tokio::test]
async fn sessions_share_one_store() {
    let store = load_store();
    let mut first = open_session(&store).await;
    let mut second = open_session(&store).await;

    first
        .client()
        .create(&PrincipalSeed::new("shared"), FieldMask::empty(), None)
        .await
        .unwrap();
    assert!(second.client().get("shared").await.is_ok());
}
