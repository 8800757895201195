use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use flvcs_crypto::HashChainVerifier;
use flvcs_types::{Address, Digest, ExecutionContext};

use crate::error::JournalResult;
use crate::event::{EventKind, EventPayload, LedgerEvent};
use crate::journal::EventJournal;

/// Filter for subscribing to a subset of ledger events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
    /// If set, only events performed by these callers are delivered.
    pub actors: Option<Vec<Address>>,
    /// If set, only events with a sequence number above this are delivered.
    pub after_seq: Option<u64>,
}

impl EventFilter {
    /// Filter that only passes the given kinds.
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Returns `true` if the event matches this filter.
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(ref actors) = self.actors {
            if !actors.contains(&event.actor) {
                return false;
            }
        }
        if let Some(after) = self.after_seq {
            if event.seq <= after {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for ledger events.
pub type EventStream = broadcast::Receiver<LedgerEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<LedgerEvent>,
}

/// Fan-out router that delivers events to matching subscribers.
struct EventRouter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventRouter {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn subscribe(&self, filter: EventFilter, capacity: usize) -> EventStream {
        let (sender, rx) = broadcast::channel(capacity);
        if let Ok(mut subs) = self.subscribers.write() {
            subs.push(Subscriber { filter, sender });
        }
        rx
    }

    /// Route an event to all matching subscribers, pruning closed channels.
    fn route(&self, event: &LedgerEvent) {
        let Ok(mut subs) = self.subscribers.write() else {
            return;
        };
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or_default()
    }
}

/// Configuration for the [`Notifier`].
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    /// Capacity of per-subscriber broadcast channels.
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Position of the last sealed event.
#[derive(Default)]
struct Cursor {
    last_seq: u64,
    last_hash: Option<Digest>,
}

/// Seals payloads into chained events, journals them, and fans them out.
///
/// Callers must emit in the same order their writes were applied; the
/// ledger does this by emitting while it still holds its write lock.
pub struct Notifier {
    router: EventRouter,
    journal: Option<EventJournal>,
    cursor: Mutex<Cursor>,
    journal_failures: AtomicU64,
    config: NotifierConfig,
}

impl Notifier {
    /// A notifier with no journal; events only reach live subscribers.
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            router: EventRouter::new(),
            journal: None,
            cursor: Mutex::new(Cursor::default()),
            journal_failures: AtomicU64::new(0),
            config,
        }
    }

    /// A notifier backed by a journal. The chain continues from the last
    /// event that can still be read back.
    ///
    /// A broken hash chain in the journal is logged, not fatal; it stays
    /// visible through [`EventJournal::verify`].
    pub fn with_journal(config: NotifierConfig, journal: EventJournal) -> JournalResult<Self> {
        let existing = journal.recover()?;
        if let Err(e) = HashChainVerifier::verify_chain(&existing) {
            warn!(
                path = %journal.path().display(),
                error = %e,
                "journal hash chain is broken; continuing after the last readable event"
            );
        }
        let cursor = existing
            .last()
            .map(|last| Cursor {
                last_seq: last.seq,
                last_hash: Some(last.event_hash),
            })
            .unwrap_or_default();

        info!(
            path = %journal.path().display(),
            resumed_at = cursor.last_seq,
            "event journal opened"
        );

        Ok(Self {
            router: EventRouter::new(),
            journal: Some(journal),
            cursor: Mutex::new(cursor),
            journal_failures: AtomicU64::new(0),
            config,
        })
    }

    fn cursor(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Continue the chain after an event sealed elsewhere, such as the last
    /// event covered by a restored snapshot.
    pub fn resume_at(&self, last_seq: u64, last_hash: Option<Digest>) {
        let mut cursor = self.cursor();
        cursor.last_seq = last_seq;
        cursor.last_hash = last_hash;
        info!(resumed_at = last_seq, "event sequence resumed");
    }

    /// Seal, journal, and route one payload.
    ///
    /// A journal append failure is logged and counted but does not undo the
    /// write the event describes; live subscribers still receive it. A
    /// payload that cannot be encoded is not sealed and the sequence does
    /// not advance.
    pub fn emit(
        &self,
        ctx: &ExecutionContext,
        payload: EventPayload,
    ) -> JournalResult<LedgerEvent> {
        let event = {
            let mut cursor = self.cursor();
            let seq = cursor.last_seq + 1;
            let event = LedgerEvent::seal(seq, ctx.timestamp, ctx.caller, payload, cursor.last_hash)
                .inspect_err(|e| error!(seq, error = %e, "event sealing failed"))?;
            cursor.last_seq = event.seq;
            cursor.last_hash = Some(event.event_hash);
            event
        };

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&event) {
                self.journal_failures.fetch_add(1, Ordering::Relaxed);
                error!(seq = event.seq, kind = %event.kind, error = %e, "journal append failed");
            }
        }

        self.router.route(&event);
        debug!(seq = event.seq, kind = %event.kind, "event emitted");
        Ok(event)
    }

    /// Subscribe to events matching the filter.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.router.subscribe(filter, self.config.channel_capacity)
    }

    /// Sequence number of the most recent event (0 if none).
    pub fn last_seq(&self) -> u64 {
        self.cursor().last_seq
    }

    /// Hash of the most recent event.
    pub fn last_hash(&self) -> Option<Digest> {
        self.cursor().last_hash
    }

    /// Number of events that could not be journaled.
    pub fn journal_failures(&self) -> u64 {
        self.journal_failures.load(Ordering::Relaxed)
    }

    pub fn journal(&self) -> Option<&EventJournal> {
        self.journal.as_ref()
    }

    pub fn subscriber_count(&self) -> usize {
        self.router.subscriber_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}
