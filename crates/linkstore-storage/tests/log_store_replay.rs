use std::collections::HashMap;
use std::sync::Arc;

use linkstore_core::{RandomGenerator, SeqGenerator};
use linkstore_storage::{
    BatchItem, Context, LinkStorage, LogConsumer, LogStore, OwnerId, ShortCode, StorageError,
};
use tempfile::TempDir;

const LINKS: usize = 200;

fn ctx() -> Context {
    Context::background()
}

#[tokio::test]
async fn fresh_instance_serves_everything_written_before_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("links.jsonl");
    let owner = OwnerId::new(3);

    let mut expected: HashMap<ShortCode, String> = HashMap::new();
    let deleted: Vec<ShortCode>;
    {
        let store: Arc<dyn LinkStorage> =
            Arc::new(LogStore::open(&path, RandomGenerator::with_prefix("lk")).unwrap());

        for i in 0..LINKS {
            let origin = format!("https://example.com/{i}");
            let owned = (i % 2 == 0).then_some(owner);
            let code = store.add(&ctx(), &origin, owned).await.unwrap();
            expected.insert(code, origin);
        }

        let owned = store.get_links_by_owner(&ctx(), owner).await.unwrap();
        deleted = owned.iter().take(10).map(|link| link.code.clone()).collect();
        store.delete_links(&ctx(), &deleted, owner).await.unwrap();
        store.close().await.unwrap();
    }

    let store = LogStore::open(&path, RandomGenerator::with_prefix("lk")).unwrap();
    assert_eq!(store.len(), LINKS);

    for (code, origin) in &expected {
        match store.get(&ctx(), code).await {
            Ok(got) => assert_eq!(&got, origin),
            Err(StorageError::Gone(_)) => assert!(deleted.contains(code)),
            Err(err) => panic!("unexpected error for {code}: {err}"),
        }
    }

    let owned = store.get_links_by_owner(&ctx(), owner).await.unwrap();
    assert_eq!(owned.len(), LINKS / 2 - deleted.len());
}

#[tokio::test]
async fn concurrent_writers_produce_a_replayable_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("links.jsonl");
    let store = Arc::new(LogStore::open(&path, SeqGenerator::with_prefix("lk")).unwrap());

    let mut handles = Vec::new();
    for task in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let items: Vec<_> = (0..10)
                .map(|i| BatchItem::new(format!("{task}-{i}"), format!("https://t{task}.example/{i}")))
                .collect();
            store.add_batch(&ctx(), None, &items).await.unwrap()
        }));
    }

    let mut written = Vec::new();
    for handle in handles {
        written.extend(handle.await.unwrap());
    }
    assert_eq!(written.len(), 80);
    store.close().await.unwrap();

    let mut consumer = LogConsumer::open(&path).unwrap();
    let events = consumer.read_all_events().unwrap();
    let sequences: Vec<_> = events.iter().map(|e| e.sequence()).collect();
    let mut sorted = sequences.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sequences, sorted, "log sequence must increase in append order");

    let reopened = LogStore::open(&path, SeqGenerator::with_prefix("lk")).unwrap();
    for result in &written {
        assert!(reopened.get(&ctx(), &result.code).await.is_ok());
    }
}
