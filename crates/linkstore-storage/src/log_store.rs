use crate::event_log::{LogConsumer, LogEntry, LogEvent, LogProducer, OwnerRegistration};
use async_trait::async_trait;
use linkstore_core::{
    BatchItem, BatchResult, Context, Generator, LinkRecord, LinkStorage, OwnerId, OwnerLink,
    Result, ShortCode, StorageError,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// How many generated codes are tried before giving up on a collision streak.
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// Lifecycle of a [`LogStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Replaying,
    Ready,
    Closed,
}

/// In-memory link index made durable by an append-only event log.
///
/// The index is rebuilt by replaying the log when the store is opened. Every
/// write appends to the log first and only touches the index once the line
/// is on disk, so a failed append never leaves a visible half-committed link.
/// One `RwLock` covers the index and the producer: writers are serialized,
/// readers run concurrently.
///
/// Writes hold the lock across a blocking `fsync` on the calling runtime
/// thread. Fine for a single-node store; under heavy write load run it on a
/// multi-threaded runtime so other tasks keep being polled.
pub struct LogStore {
    inner: RwLock<Index>,
    generator: Arc<dyn Generator>,
    path: PathBuf,
}

struct Index {
    state: StoreState,
    records: HashMap<ShortCode, LinkRecord>,
    /// Live origin -> code, the idempotent-add lookup.
    live_origins: HashMap<String, ShortCode>,
    /// Codes per owner in creation order.
    owners: HashMap<OwnerId, Vec<ShortCode>>,
    producer: LogProducer,
    consumer: LogConsumer,
    next_sequence: u64,
    /// One past the highest owner id seen in links or registrations.
    next_owner: i64,
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.inner.read();
        f.debug_struct("LogStore")
            .field("path", &self.path)
            .field("state", &index.state)
            .field("records", &index.records.len())
            .finish()
    }
}

impl LogStore {
    /// Opens the log at `path` and replays it into a fresh index.
    ///
    /// Any replay failure is returned and no store is produced; there is no
    /// degraded start.
    pub fn open(path: impl AsRef<Path>, generator: impl Generator) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "opening event log");

        let producer = LogProducer::open(&path)?;
        let consumer = LogConsumer::open(&path)?;

        let mut index = Index {
            state: StoreState::Uninitialized,
            records: HashMap::new(),
            live_origins: HashMap::new(),
            owners: HashMap::new(),
            producer,
            consumer,
            next_sequence: 1,
            next_owner: 1,
        };

        index.state = StoreState::Replaying;
        let events = index.consumer.read_all_events().inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to replay event log");
        })?;
        let replayed = events.len();
        for event in events {
            index.apply(event);
        }
        index.state = StoreState::Ready;

        info!(
            path = %path.display(),
            entries = replayed,
            links = index.records.len(),
            next_owner = index.next_owner,
            "event log replayed"
        );

        Ok(Self {
            inner: RwLock::new(index),
            generator: Arc::new(generator),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> StoreState {
        self.inner.read().state
    }

    /// Number of records held, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fresh_code(&self, index: &Index) -> Result<ShortCode> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.generator.generate();
            if !index.records.contains_key(&code) {
                return Ok(code);
            }
            debug!(code = %code, "generated code already taken, retrying");
        }
        Err(StorageError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Adds one origin while the write lock is held.
    fn add_locked(&self, index: &mut Index, origin: &str, owner: Option<OwnerId>) -> Result<ShortCode> {
        if let Some(code) = index.live_origins.get(origin) {
            debug!(code = %code, "origin already shortened");
            return Err(StorageError::Conflict { code: code.clone() });
        }

        let code = self.fresh_code(index)?;
        let entry = LogEntry::created(index.next_sequence, code.clone(), origin.to_owned(), owner);

        let event = LogEvent::Link(entry);
        index.producer.write_event(&event).inspect_err(|e| {
            warn!(code = %code, error = %e, "failed to append link to event log");
        })?;
        index.apply(event);

        Ok(code)
    }
}

impl Index {
    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            StoreState::Ready => Ok(()),
            StoreState::Closed => Err(StorageError::Closed),
            state => Err(StorageError::Unavailable(format!("store is {state:?}"))),
        }
    }

    /// Folds one log event into the index. Used by replay and by live writes.
    fn apply(&mut self, event: LogEvent) {
        self.next_sequence = self.next_sequence.max(event.sequence() + 1);

        let entry = match event {
            LogEvent::Link(entry) => entry,
            LogEvent::OwnerRegistered(registration) => {
                self.see_owner(registration.owner);
                return;
            }
        };
        if let Some(owner) = entry.owner {
            self.see_owner(owner);
        }

        if entry.deleted {
            match self.records.get_mut(&entry.code) {
                Some(record) if record.is_live() => {
                    record.deleted = true;
                    if self.live_origins.get(&record.origin) == Some(&record.code) {
                        self.live_origins.remove(&record.origin);
                    }
                }
                Some(_) => {}
                None => warn!(code = %entry.code, "deletion entry for unknown code skipped"),
            }
            return;
        }

        if let Some(owner) = entry.owner {
            if !self.records.contains_key(&entry.code) {
                self.owners.entry(owner).or_default().push(entry.code.clone());
            }
        }
        self.live_origins
            .entry(entry.origin.clone())
            .or_insert_with(|| entry.code.clone());
        self.records.insert(
            entry.code.clone(),
            LinkRecord::new(entry.code, entry.origin, entry.owner),
        );
    }

    fn see_owner(&mut self, owner: OwnerId) {
        self.next_owner = self.next_owner.max(owner.get() + 1);
    }
}

#[async_trait]
impl LinkStorage for LogStore {
    async fn add(&self, ctx: &Context, origin: &str, owner: Option<OwnerId>) -> Result<ShortCode> {
        ctx.check()?;
        trace!(origin = %origin, "adding link");

        let mut guard = self.inner.write();
        let index = &mut *guard;
        index.ensure_ready()?;

        self.add_locked(index, origin, owner)
    }

    async fn add_batch(
        &self,
        ctx: &Context,
        owner: Option<OwnerId>,
        items: &[BatchItem],
    ) -> Result<Vec<BatchResult>> {
        ctx.check()?;
        trace!(items = items.len(), "adding link batch");

        let mut guard = self.inner.write();
        let index = &mut *guard;
        index.ensure_ready()?;

        let mut committed = Vec::with_capacity(items.len());
        for item in items {
            match self.add_locked(index, &item.origin, owner) {
                Ok(code) => committed.push(BatchResult {
                    correlation_id: item.correlation_id.clone(),
                    code,
                }),
                Err(source) => {
                    warn!(
                        correlation_id = %item.correlation_id,
                        committed = committed.len(),
                        error = %source,
                        "link batch stopped early"
                    );
                    return Err(StorageError::PartialBatch {
                        committed,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(committed)
    }

    async fn get(&self, ctx: &Context, code: &ShortCode) -> Result<String> {
        ctx.check()?;

        let index = self.inner.read();
        index.ensure_ready()?;

        match index.records.get(code) {
            Some(record) if record.is_live() => Ok(record.origin.clone()),
            Some(_) => Err(StorageError::Gone(code.to_string())),
            None => Err(StorageError::NotFound(code.to_string())),
        }
    }

    async fn get_links_by_owner(&self, ctx: &Context, owner: OwnerId) -> Result<Vec<OwnerLink>> {
        ctx.check()?;

        let index = self.inner.read();
        index.ensure_ready()?;

        let links: Vec<OwnerLink> = index
            .owners
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|code| index.records.get(code))
            .filter(|record| record.is_live())
            .map(|record| OwnerLink {
                code: record.code.clone(),
                origin: record.origin.clone(),
            })
            .collect();

        if links.is_empty() {
            return Err(StorageError::NoLinksByOwner(owner));
        }
        Ok(links)
    }

    async fn delete_links(&self, ctx: &Context, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        ctx.check()?;

        let mut guard = self.inner.write();
        let index = &mut *guard;
        index.ensure_ready()?;

        let mut deleted = 0usize;
        for code in codes {
            let origin = match index.records.get(code) {
                Some(record) if record.is_live() && record.owner == Some(owner) => {
                    record.origin.clone()
                }
                _ => continue,
            };

            let event = LogEvent::Link(LogEntry::deleted(
                index.next_sequence,
                code.clone(),
                origin,
                Some(owner),
            ));
            index.producer.write_event(&event).inspect_err(|e| {
                warn!(code = %code, error = %e, "failed to append deletion to event log");
            })?;
            index.apply(event);
            deleted += 1;
        }

        debug!(owner = %owner, requested = codes.len(), deleted, "soft-deleted links");
        Ok(())
    }

    async fn register_owner(&self, ctx: &Context) -> Result<OwnerId> {
        ctx.check()?;

        let mut guard = self.inner.write();
        let index = &mut *guard;
        index.ensure_ready()?;

        let owner = OwnerId::new(index.next_owner);
        let event = LogEvent::OwnerRegistered(OwnerRegistration {
            sequence: index.next_sequence,
            owner,
        });
        index.producer.write_event(&event).inspect_err(|e| {
            warn!(owner = %owner, error = %e, "failed to append owner registration to event log");
        })?;
        index.apply(event);

        debug!(owner = %owner, "registered owner");
        Ok(owner)
    }

    async fn ping(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;
        self.inner.read().ensure_ready()
    }

    async fn close(&self) -> Result<()> {
        let mut index = self.inner.write();
        if index.state == StoreState::Closed {
            return Ok(());
        }

        index.producer.close()?;
        index.consumer.close()?;
        index.state = StoreState::Closed;

        info!(path = %self.path.display(), "event log closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkstore_core::SeqGenerator;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn path(&self) -> PathBuf {
            self.dir.path().join("links.jsonl")
        }

        fn open(&self) -> LogStore {
            LogStore::open(self.path(), SeqGenerator::with_prefix("lk")).unwrap()
        }
    }

    fn ctx() -> Context {
        Context::background()
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let fixture = Fixture::new();
        let store = fixture.open();

        let code = store.add(&ctx(), "https://x.com", None).await.unwrap();

        assert_eq!(store.get(&ctx(), &code).await.unwrap(), "https://x.com");
    }

    #[tokio::test]
    async fn repeated_origin_conflicts_with_existing_code() {
        let fixture = Fixture::new();
        let store = fixture.open();

        let first = store.add(&ctx(), "https://x.com", None).await.unwrap();
        let err = store.add(&ctx(), "https://x.com", None).await.unwrap_err();

        match err {
            StorageError::Conflict { code } => assert_eq!(code, first),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let fixture = Fixture::new();
        let store = fixture.open();

        let err = store
            .get(&ctx(), &ShortCode::new_unchecked("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn replay_restores_every_link() {
        let fixture = Fixture::new();
        let mut added = Vec::new();

        {
            let store = fixture.open();
            for i in 0..10 {
                let origin = format!("https://example{i}.com");
                let code = store.add(&ctx(), &origin, None).await.unwrap();
                added.push((code, origin));
            }
            store.close().await.unwrap();
        }

        let reopened = fixture.open();
        assert_eq!(reopened.len(), 10);
        for (code, origin) in &added {
            assert_eq!(&reopened.get(&ctx(), code).await.unwrap(), origin);
        }
    }

    #[tokio::test]
    async fn replay_continues_sequence_numbers() {
        let fixture = Fixture::new();
        {
            let store = fixture.open();
            store.add(&ctx(), "https://a.com", None).await.unwrap();
            store.add(&ctx(), "https://b.com", None).await.unwrap();
        }
        {
            let store = fixture.open();
            store.add(&ctx(), "https://c.com", None).await.unwrap();
        }

        let contents = fs::read_to_string(fixture.path()).unwrap();
        let sequences: Vec<u64> = contents
            .lines()
            .map(|line| serde_json::from_str::<LogEntry>(line).unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn restarted_sequential_generator_skips_taken_codes() {
        let fixture = Fixture::new();
        let first = {
            let store = fixture.open();
            store.add(&ctx(), "https://a.com", None).await.unwrap()
        };

        // a fresh generator starts at lk000000 again
        let store = fixture.open();
        let second = store.add(&ctx(), "https://b.com", None).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.get(&ctx(), &first).await.unwrap(), "https://a.com");
        assert_eq!(store.get(&ctx(), &second).await.unwrap(), "https://b.com");
    }

    #[tokio::test]
    async fn corrupt_log_fails_open() {
        let fixture = Fixture::new();
        fs::write(
            fixture.path(),
            "{\"uuid\":1,\"original_url\":\"https://a.com\",\"short_url\":\"aaa\"}\nnot json\n",
        )
        .unwrap();

        let err = LogStore::open(fixture.path(), SeqGenerator::with_prefix("lk")).unwrap_err();
        assert!(matches!(err, StorageError::CorruptLog { line: 2, .. }));
    }

    #[tokio::test]
    async fn batch_keeps_items_before_failure() {
        let fixture = Fixture::new();
        let store = fixture.open();

        let items = vec![
            BatchItem::new("1", "https://a.com"),
            BatchItem::new("2", "https://b.com"),
            BatchItem::new("3", "https://a.com"),
            BatchItem::new("4", "https://c.com"),
        ];

        let err = store.add_batch(&ctx(), None, &items).await.unwrap_err();
        let StorageError::PartialBatch { committed, source } = err else {
            panic!("expected partial batch error");
        };

        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].correlation_id, "1");
        assert_eq!(committed[1].correlation_id, "2");
        assert!(matches!(*source, StorageError::Conflict { .. }));

        // persisted, and the item after the failure never ran
        let reopened = {
            store.close().await.unwrap();
            fixture.open()
        };
        assert_eq!(reopened.len(), 2);
        for result in &committed {
            assert!(reopened.get(&ctx(), &result.code).await.is_ok());
        }
    }

    #[tokio::test]
    async fn batch_returns_codes_in_request_order() {
        let fixture = Fixture::new();
        let store = fixture.open();

        let items = vec![
            BatchItem::new("x", "https://a.com"),
            BatchItem::new("y", "https://b.com"),
        ];
        let results = store.add_batch(&ctx(), None, &items).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].correlation_id, "x");
        assert_eq!(
            store.get(&ctx(), &results[1].code).await.unwrap(),
            "https://b.com"
        );
    }

    #[tokio::test]
    async fn delete_marks_links_gone_and_survives_replay() {
        let fixture = Fixture::new();
        let owner = OwnerId::new(1);
        let code = {
            let store = fixture.open();
            let code = store.add(&ctx(), "https://x.com", Some(owner)).await.unwrap();
            store
                .delete_links(&ctx(), std::slice::from_ref(&code), owner)
                .await
                .unwrap();
            assert!(matches!(
                store.get(&ctx(), &code).await,
                Err(StorageError::Gone(_))
            ));
            code
        };

        let reopened = fixture.open();
        assert!(matches!(
            reopened.get(&ctx(), &code).await,
            Err(StorageError::Gone(_))
        ));
    }

    #[tokio::test]
    async fn deleted_origin_can_be_shortened_again() {
        let fixture = Fixture::new();
        let store = fixture.open();
        let owner = OwnerId::new(1);

        let old = store.add(&ctx(), "https://x.com", Some(owner)).await.unwrap();
        store
            .delete_links(&ctx(), std::slice::from_ref(&old), owner)
            .await
            .unwrap();
        let new = store.add(&ctx(), "https://x.com", Some(owner)).await.unwrap();

        assert_ne!(old, new);
        assert_eq!(store.get(&ctx(), &new).await.unwrap(), "https://x.com");
    }

    #[tokio::test]
    async fn delete_ignores_links_of_other_owners() {
        let fixture = Fixture::new();
        let store = fixture.open();

        let code = store
            .add(&ctx(), "https://x.com", Some(OwnerId::new(1)))
            .await
            .unwrap();
        store
            .delete_links(&ctx(), std::slice::from_ref(&code), OwnerId::new(2))
            .await
            .unwrap();

        assert_eq!(store.get(&ctx(), &code).await.unwrap(), "https://x.com");
    }

    #[tokio::test]
    async fn links_by_owner_lists_live_links_in_creation_order() {
        let fixture = Fixture::new();
        let store = fixture.open();
        let owner = OwnerId::new(4);

        let a = store.add(&ctx(), "https://a.com", Some(owner)).await.unwrap();
        let b = store.add(&ctx(), "https://b.com", Some(owner)).await.unwrap();
        let c = store.add(&ctx(), "https://c.com", Some(owner)).await.unwrap();
        store.add(&ctx(), "https://other.com", None).await.unwrap();
        store
            .delete_links(&ctx(), std::slice::from_ref(&b), owner)
            .await
            .unwrap();

        let links = store.get_links_by_owner(&ctx(), owner).await.unwrap();
        let codes: Vec<_> = links.iter().map(|l| l.code.clone()).collect();
        assert_eq!(codes, vec![a, c]);
    }

    #[tokio::test]
    async fn owner_without_links_is_reported() {
        let fixture = Fixture::new();
        let store = fixture.open();

        let err = store
            .get_links_by_owner(&ctx(), OwnerId::new(9))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NoLinksByOwner(owner) if owner.get() == 9));
    }

    #[tokio::test]
    async fn register_owner_continues_after_replayed_owners() {
        let fixture = Fixture::new();
        {
            let store = fixture.open();
            store
                .add(&ctx(), "https://a.com", Some(OwnerId::new(41)))
                .await
                .unwrap();
        }

        let store = fixture.open();
        let first = store.register_owner(&ctx()).await.unwrap();
        let second = store.register_owner(&ctx()).await.unwrap();

        assert_eq!(first.get(), 42);
        assert_eq!(second.get(), 43);
    }

    #[tokio::test]
    async fn registered_owner_ids_stay_unique_across_restart() {
        let fixture = Fixture::new();
        let alice = {
            let store = fixture.open();
            let alice = store.register_owner(&ctx()).await.unwrap();
            store.close().await.unwrap();
            alice
        };

        let store = fixture.open();
        let bob = store.register_owner(&ctx()).await.unwrap();
        assert_ne!(alice, bob);

        let code = store.add(&ctx(), "https://a.com", Some(alice)).await.unwrap();
        store
            .delete_links(&ctx(), std::slice::from_ref(&code), bob)
            .await
            .unwrap();

        assert_eq!(store.get(&ctx(), &code).await.unwrap(), "https://a.com");
    }

    #[tokio::test]
    async fn replayed_owner_listing_has_no_duplicates() {
        let fixture = Fixture::new();
        fs::write(
            fixture.path(),
            concat!(
                "{\"uuid\":1,\"original_url\":\"https://a.com\",\"short_url\":\"aaa\",\"user_id\":1}\n",
                "{\"uuid\":2,\"original_url\":\"https://b.com\",\"short_url\":\"bbb\",\"user_id\":1}\n",
                "{\"uuid\":3,\"original_url\":\"https://a.com\",\"short_url\":\"aaa\",\"user_id\":1}\n",
            ),
        )
        .unwrap();

        let store = fixture.open();
        let links = store
            .get_links_by_owner(&ctx(), OwnerId::new(1))
            .await
            .unwrap();
        let codes: Vec<_> = links.iter().map(|l| l.code.as_str().to_owned()).collect();

        assert_eq!(codes, vec!["aaa", "bbb"]);
    }

    #[tokio::test]
    async fn owner_listing_keeps_creation_order_after_replay() {
        let fixture = Fixture::new();
        let owner = OwnerId::new(2);
        let added: Vec<ShortCode> = {
            let store = fixture.open();
            let mut added = Vec::new();
            for i in 0..50 {
                let origin = format!("https://example.com/{i}");
                added.push(store.add(&ctx(), &origin, Some(owner)).await.unwrap());
            }
            store.close().await.unwrap();
            added
        };

        let store = fixture.open();
        let listed: Vec<_> = store
            .get_links_by_owner(&ctx(), owner)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.code)
            .collect();

        assert_eq!(listed, added);
    }

    #[tokio::test]
    async fn failed_append_leaves_index_untouched() {
        let fixture = Fixture::new();
        let store = fixture.open();
        store.inner.write().producer.close().unwrap();

        let err = store.add(&ctx(), "https://x.com", None).await.unwrap_err();
        assert!(matches!(err, StorageError::Closed));
        assert!(store.is_empty());
        // the code the sequential generator handed out was never indexed
        assert!(matches!(
            store.get(&ctx(), &ShortCode::new_unchecked("lk000000")).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(fs::read_to_string(fixture.path()).unwrap().is_empty());

        store.inner.write().producer = LogProducer::open(fixture.path()).unwrap();
        let code = store.add(&ctx(), "https://x.com", None).await.unwrap();
        assert_eq!(store.get(&ctx(), &code).await.unwrap(), "https://x.com");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn failed_owner_registration_does_not_consume_an_id() {
        let fixture = Fixture::new();
        let store = fixture.open();
        store.inner.write().producer.close().unwrap();

        assert!(matches!(
            store.register_owner(&ctx()).await,
            Err(StorageError::Closed)
        ));

        store.inner.write().producer = LogProducer::open(fixture.path()).unwrap();
        assert_eq!(store.register_owner(&ctx()).await.unwrap().get(), 1);
    }

    #[tokio::test]
    async fn cancelled_context_does_no_work() {
        let fixture = Fixture::new();
        let store = fixture.open();
        let cancelled = Context::background();
        cancelled.cancel();

        let err = store.add(&cancelled, "https://x.com", None).await.unwrap_err();

        assert!(matches!(err, StorageError::Cancelled));
        assert!(store.is_empty());
        assert!(fs::read_to_string(fixture.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let fixture = Fixture::new();
        let store = fixture.open();
        assert_eq!(store.state(), StoreState::Ready);

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert_eq!(store.state(), StoreState::Closed);
        assert!(matches!(store.ping(&ctx()).await, Err(StorageError::Closed)));
        assert!(matches!(
            store.add(&ctx(), "https://x.com", None).await,
            Err(StorageError::Closed)
        ));
    }

    #[tokio::test]
    async fn concurrent_adds_and_gets() {
        let fixture = Fixture::new();
        let store = Arc::new(fixture.open());
        let mut handles = vec![];

        for i in 0..20u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let origin = format!("https://example{i}.com");
                let code = store.add(&Context::background(), &origin, None).await.unwrap();
                let resolved = store.get(&Context::background(), &code).await.unwrap();
                assert_eq!(resolved, origin);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 20);

        store.close().await.unwrap();
        assert_eq!(fixture.open().len(), 20);
    }
}
