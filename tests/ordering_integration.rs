//! Link ordering integration tests
//!
//! Positions must stay unique and contiguous per owner through any mix of
//! append, remove and reorder, including randomized sequences and concurrent
//! writers on one owner.
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)

use biolink::models::{Link, NewLink};
use biolink::ordering::{positions_are_contiguous, LinkOrdering, OrderingError};
use biolink::storage::{PostgresStorage, SqliteStorage, Storage};
use rand::RngExt;
use std::sync::Arc;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

/// Owner ids unique per run so shared Postgres databases never collide
fn fresh_owner(prefix: &str) -> String {
    let suffix: u64 = rand::rng().random_range(0..u64::MAX);
    format!("{prefix}-{suffix:x}")
}

fn new_link(title: &str) -> NewLink {
    NewLink {
        title: title.to_string(),
        url: format!("https://example.com/{}", title.to_lowercase()),
        description: None,
    }
}

fn ids(links: &[Link]) -> Vec<String> {
    links.iter().map(|l| l.id.clone()).collect()
}

fn titles(links: &[Link]) -> Vec<String> {
    links.iter().map(|l| l.title.clone()).collect()
}

async fn assert_contiguous(ordering: &LinkOrdering, owner: &str) -> Vec<Link> {
    let links = ordering.list(owner).await.unwrap();
    assert!(
        positions_are_contiguous(&links),
        "positions for {owner} are not 0..n: {:?}",
        links.iter().map(|l| l.position).collect::<Vec<_>>()
    );
    links
}

async fn run_operation_sequence(storage: Arc<dyn Storage>) {
    let ordering = LinkOrdering::new(storage, 5);
    let owner = fresh_owner("seq");

    let mut created = Vec::new();
    for title in ["One", "Two", "Three", "Four", "Five"] {
        created.push(ordering.append(&owner, new_link(title)).await.unwrap());
        assert_contiguous(&ordering, &owner).await;
    }

    // Remove from the middle, the front and the back
    ordering.remove(&created[2].id).await.unwrap();
    assert_eq!(
        titles(&assert_contiguous(&ordering, &owner).await),
        ["One", "Two", "Four", "Five"]
    );
    ordering.remove(&created[0].id).await.unwrap();
    ordering.remove(&created[4].id).await.unwrap();
    let links = assert_contiguous(&ordering, &owner).await;
    assert_eq!(titles(&links), ["Two", "Four"]);

    // Append after removals lands at the end
    ordering.append(&owner, new_link("Six")).await.unwrap();
    let links = assert_contiguous(&ordering, &owner).await;
    assert_eq!(titles(&links), ["Two", "Four", "Six"]);

    let mut reversed = ids(&links);
    reversed.reverse();
    ordering.reorder(&owner, &reversed).await.unwrap();
    let links = assert_contiguous(&ordering, &owner).await;
    assert_eq!(titles(&links), ["Six", "Four", "Two"]);

    // Toggling never moves a link
    ordering.toggle_active(&links[1].id, false).await.unwrap();
    let after = assert_contiguous(&ordering, &owner).await;
    assert_eq!(ids(&after), ids(&links));
    assert!(!after[1].is_active);

    ordering.remove(&after[0].id).await.unwrap();
    ordering.remove(&after[1].id).await.unwrap();
    ordering.remove(&after[2].id).await.unwrap();
    assert!(assert_contiguous(&ordering, &owner).await.is_empty());

    // Empty list starts over at zero
    let first = ordering.append(&owner, new_link("Again")).await.unwrap();
    assert_eq!(first.position, 0);
}

async fn run_concurrent_appends(storage: Arc<dyn Storage>) {
    let ordering = Arc::new(LinkOrdering::new(storage, 20));
    let owner = fresh_owner("burst");

    let mut handles = vec![];
    for i in 0..10 {
        let ordering = Arc::clone(&ordering);
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            ordering.append(&owner, new_link(&format!("Link{i}"))).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().expect("append should succeed");
    }

    let links = assert_contiguous(&ordering, &owner).await;
    assert_eq!(links.len(), 10);
    let positions: Vec<i64> = links.iter().map(|l| l.position).collect();
    assert_eq!(positions, (0..10).collect::<Vec<i64>>());
}

/// Random append/remove/reorder steps checked against a plain in-memory list
async fn run_random_sequence(storage: Arc<dyn Storage>) {
    let ordering = LinkOrdering::new(storage, 5);
    let owner = fresh_owner("random");
    let mut rng = rand::rng();
    let mut expected: Vec<String> = Vec::new();

    for step in 0..120 {
        let op = if expected.is_empty() {
            0
        } else {
            rng.random_range(0..3)
        };
        match op {
            0 => {
                let link = ordering
                    .append(&owner, new_link(&format!("Step{step}")))
                    .await
                    .unwrap();
                assert_eq!(link.position, expected.len() as i64);
                expected.push(link.id);
            }
            1 => {
                let index = rng.random_range(0..expected.len());
                let id = expected.remove(index);
                ordering.remove(&id).await.unwrap();
            }
            _ => {
                for i in (1..expected.len()).rev() {
                    let j = rng.random_range(0..=i);
                    expected.swap(i, j);
                }
                ordering.reorder(&owner, &expected).await.unwrap();
            }
        }

        let links = assert_contiguous(&ordering, &owner).await;
        assert_eq!(ids(&links), expected, "order diverged at step {step}");
    }
}

/// Appends, removes and reorders racing on one owner
async fn run_concurrent_mixed_writes(storage: Arc<dyn Storage>) {
    let ordering = Arc::new(LinkOrdering::new(storage, 20));
    let owner = fresh_owner("mixed");

    let mut seeded = Vec::new();
    for i in 0..6 {
        seeded.push(ordering.append(&owner, new_link(&format!("Seed{i}"))).await.unwrap());
    }

    let mut handles = vec![];
    for i in 0..5 {
        let ordering = Arc::clone(&ordering);
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            ordering
                .append(&owner, new_link(&format!("Burst{i}")))
                .await
                .map(|_| ())
        }));
    }
    for link in seeded.iter().step_by(2) {
        let ordering = Arc::clone(&ordering);
        let id = link.id.clone();
        handles.push(tokio::spawn(async move { ordering.remove(&id).await }));
    }
    for _ in 0..4 {
        let ordering = Arc::clone(&ordering);
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            let mut order = ids(&ordering.list(&owner).await?);
            order.reverse();
            ordering.reorder(&owner, &order).await
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            // A reorder built from a list another writer already changed
            Ok(()) | Err(OrderingError::InvalidInput(_)) => {}
            Err(e) => panic!("concurrent write failed: {e}"),
        }
    }

    let links = assert_contiguous(&ordering, &owner).await;
    assert_eq!(links.len(), 6 + 5 - 3);
    for removed in seeded.iter().step_by(2) {
        assert!(links.iter().all(|l| l.id != removed.id));
    }
}

async fn run_owner_isolation(storage: Arc<dyn Storage>) {
    let ordering = LinkOrdering::new(storage, 5);
    let alice = fresh_owner("alice");
    let bob = fresh_owner("bob");

    let a0 = ordering.append(&alice, new_link("A0")).await.unwrap();
    let b0 = ordering.append(&bob, new_link("B0")).await.unwrap();
    ordering.append(&alice, new_link("A1")).await.unwrap();
    let b1 = ordering.append(&bob, new_link("B1")).await.unwrap();

    assert_eq!(a0.position, 0);
    assert_eq!(b0.position, 0);
    assert_eq!(b1.position, 1);

    ordering.remove(&a0.id).await.unwrap();
    let bob_links = assert_contiguous(&ordering, &bob).await;
    assert_eq!(titles(&bob_links), ["B0", "B1"]);

    // Bob's ids are not a permutation of Alice's links
    let err = ordering.reorder(&alice, &ids(&bob_links)).await.unwrap_err();
    assert!(matches!(err, OrderingError::InvalidInput(_)));
    assert_eq!(titles(&assert_contiguous(&ordering, &alice).await), ["A1"]);
}

#[tokio::test]
async fn test_operation_sequence_keeps_positions_contiguous_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_operation_sequence(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_appends_get_distinct_positions_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_concurrent_appends(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_owners_are_isolated_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_owner_isolation(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_random_sequence_keeps_positions_contiguous_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_random_sequence(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_mixed_writes_keep_positions_contiguous_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_concurrent_mixed_writes(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_reorder_example_from_dashboard_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }

    let ordering = LinkOrdering::new(create_sqlite_storage().await, 5);
    let a = ordering.append("owner", new_link("A")).await.unwrap();
    let b = ordering.append("owner", new_link("B")).await.unwrap();
    let c = ordering.append("owner", new_link("C")).await.unwrap();

    ordering
        .reorder("owner", &[c.id.clone(), a.id.clone(), b.id.clone()])
        .await
        .unwrap();
    let links = ordering.list("owner").await.unwrap();
    assert_eq!(titles(&links), ["C", "A", "B"]);

    ordering.remove(&a.id).await.unwrap();
    let links = ordering.list("owner").await.unwrap();
    assert_eq!(titles(&links), ["C", "B"]);
    assert_eq!(links[1].position, 1);
}

#[tokio::test]
async fn test_operation_sequence_keeps_positions_contiguous_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        println!("SKIPPED: DATABASE_URL not set");
        return;
    };
    run_operation_sequence(storage).await;
}

#[tokio::test]
async fn test_concurrent_appends_get_distinct_positions_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        println!("SKIPPED: DATABASE_URL not set");
        return;
    };
    run_concurrent_appends(storage).await;
}

#[tokio::test]
async fn test_owners_are_isolated_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        println!("SKIPPED: DATABASE_URL not set");
        return;
    };
    run_owner_isolation(storage).await;
}

#[tokio::test]
async fn test_random_sequence_keeps_positions_contiguous_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        println!("SKIPPED: DATABASE_URL not set");
        return;
    };
    run_random_sequence(storage).await;
}

#[tokio::test]
async fn test_concurrent_mixed_writes_keep_positions_contiguous_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        println!("SKIPPED: DATABASE_URL not set");
        return;
    };
    run_concurrent_mixed_writes(storage).await;
}
