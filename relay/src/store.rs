//! In-memory notification buffer.
//!
//! All mutations happen under a single mutex: an ingest appends and assigns the
//! sequence number in one critical section, a fetch reads and advances (or
//! drains) in another. Nothing awaits while the lock is held.

use crate::config::{BufferConfig, BufferMode};
use crate::errors::RelayError;
use crate::metrics_defs::{
    NOTIFICATIONS_DELIVERED, NOTIFICATIONS_EVICTED, NOTIFICATIONS_INGESTED, NOTIFICATIONS_PENDING,
};
use crate::model::{
    IngestReceipt, IngestRequest, NOTIFICATION_ID_PREFIX, NotificationRecord, Target,
};
use parking_lot::Mutex;
use shared::{counter, gauge};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

struct Entry {
    seq: u64,
    stored_at: Instant,
    target: Target,
    record: NotificationRecord,
}

impl Entry {
    /// Targeted entries can go once every recipient has read past them.
    /// Broadcasts stay until they expire or are evicted, since new readers may still show up.
    fn consumed(&self, cursors: &HashMap<String, u64>) -> bool {
        match &self.target {
            Target::All => false,
            Target::Users(users) => users
                .iter()
                .all(|user| cursors.get(user).is_some_and(|cursor| *cursor > self.seq)),
        }
    }

    /// Every reader known so far has received this entry. Dropping it only
    /// costs readers that have not connected yet.
    fn delivered(&self, cursors: &HashMap<String, u64>) -> bool {
        match &self.target {
            Target::All => {
                !cursors.is_empty() && cursors.values().all(|cursor| *cursor > self.seq)
            }
            Target::Users(_) => self.consumed(cursors),
        }
    }
}

#[derive(Default)]
struct BufferState {
    next_seq: u64,
    log: VecDeque<Entry>,
    // Next unseen sequence number per reader. Readers that never fetched start at 0.
    cursors: HashMap<String, u64>,
    // Entries dropped before every known reader received them.
    evicted: u64,
}

impl BufferState {
    fn expire(&mut self, retention: Option<Duration>, now: Instant) {
        let Some(retention) = retention else {
            return;
        };

        let mut expired = 0u64;
        while self
            .log
            .front()
            .is_some_and(|entry| now.duration_since(entry.stored_at) >= retention)
        {
            let entry = self.log.pop_front();
            if entry.is_some_and(|entry| !entry.delivered(&self.cursors)) {
                expired += 1;
            }
        }

        if expired > 0 {
            tracing::debug!(expired, "dropped expired notifications");
            self.evicted += expired;
            counter!(NOTIFICATIONS_EVICTED, "reason" => "expired").increment(expired);
        }
    }

    /// Shrinks the log to `max_pending` entries, oldest first. Only entries
    /// some known reader has not received yet count as evicted.
    fn evict_over_capacity(&mut self, max_pending: usize) {
        while self.log.len() > max_pending {
            let Some(entry) = self.log.pop_front() else {
                break;
            };

            if entry.delivered(&self.cursors) {
                tracing::debug!(
                    notification_id = %entry.record.id,
                    "dropping delivered notification to make room"
                );
                continue;
            }

            tracing::warn!(
                notification_id = %entry.record.id,
                max_pending,
                "buffer full, evicting undelivered notification"
            );
            counter!(NOTIFICATIONS_EVICTED, "reason" => "capacity").increment(1);
            self.evicted += 1;
        }
    }

    fn drain_all(&mut self) -> Vec<NotificationRecord> {
        self.log.drain(..).map(|entry| entry.record).collect()
    }

    fn read_from_cursor(&mut self, reader: &str) -> Vec<NotificationRecord> {
        let cursor = self.cursors.get(reader).copied().unwrap_or(0);

        let delivered = self
            .log
            .iter()
            .filter(|entry| entry.seq >= cursor && entry.target.includes(reader))
            .map(|entry| entry.record.clone())
            .collect();

        self.cursors.insert(reader.to_string(), self.next_seq);

        let cursors = &self.cursors;
        self.log.retain(|entry| !entry.consumed(cursors));

        delivered
    }
}

/// Handle to the process-wide notification buffer. Clones share the same buffer.
#[derive(Clone)]
pub struct NotificationStore {
    state: Arc<Mutex<BufferState>>,
    config: Arc<BufferConfig>,
}

impl NotificationStore {
    pub fn new(config: BufferConfig) -> Self {
        NotificationStore {
            state: Arc::new(Mutex::new(BufferState::default())),
            config: Arc::new(config),
        }
    }

    pub fn mode(&self) -> BufferMode {
        self.config.mode
    }

    /// Number of notifications currently retained, delivered or not.
    pub fn pending(&self) -> usize {
        self.state.lock().log.len()
    }

    /// Notifications dropped (expired or over capacity) before every known
    /// reader received them.
    pub fn evicted(&self) -> u64 {
        self.state.lock().evicted
    }

    /// Stores a new notification built from `request`, applying defaults for
    /// the optional fields.
    pub fn ingest(&self, request: IngestRequest) -> Result<IngestReceipt, RelayError> {
        let target = self.resolve_target(request.target_users)?;

        let mut state = self.state.lock();
        state.expire(self.config.retention(), Instant::now());

        let seq = state.next_seq;
        state.next_seq += 1;

        let created_at = epoch_millis();
        let record = NotificationRecord {
            id: format!("{NOTIFICATION_ID_PREFIX}{created_at}_{seq}"),
            message: request.message,
            kind: request.kind.unwrap_or_default(),
            auto_close: request.auto_close.unwrap_or_default(),
            created_at,
            actions: request.actions.unwrap_or_default(),
            data: request.data,
        };

        let receipt = IngestReceipt {
            success: true,
            notification_id: record.id.clone(),
            target_users: target.clone(),
        };

        state.log.push_back(Entry {
            seq,
            stored_at: Instant::now(),
            target,
            record,
        });
        state.evict_over_capacity(self.config.max_pending);
        gauge!(NOTIFICATIONS_PENDING).set(state.log.len() as f64);
        drop(state);

        counter!(NOTIFICATIONS_INGESTED).increment(1);
        Ok(receipt)
    }

    /// Returns everything pending for `reader` and forgets it, so the same
    /// notification is never returned to the same reader twice.
    pub fn fetch(&self, reader: &str) -> Vec<NotificationRecord> {
        let mut state = self.state.lock();
        state.expire(self.config.retention(), Instant::now());

        let delivered = match self.config.mode {
            BufferMode::Shared => state.drain_all(),
            BufferMode::PerUser => state.read_from_cursor(reader),
        };
        gauge!(NOTIFICATIONS_PENDING).set(state.log.len() as f64);
        drop(state);

        if !delivered.is_empty() {
            counter!(NOTIFICATIONS_DELIVERED).increment(delivered.len() as u64);
        }
        delivered
    }

    fn resolve_target(&self, target_users: Option<Vec<String>>) -> Result<Target, RelayError> {
        let Some(users) = target_users else {
            return Ok(Target::All);
        };

        if self.config.mode == BufferMode::Shared {
            tracing::debug!(?users, "shared buffer ignores target_users");
            return Ok(Target::All);
        }

        if users.is_empty() {
            return Err(RelayError::InvalidPayload(
                "'target_users' must not be empty".to_string(),
            ));
        }
        if users.iter().any(|user| user.is_empty()) {
            return Err(RelayError::InvalidPayload(
                "'target_users' contains an empty user name".to_string(),
            ));
        }

        Ok(Target::Users(users.into_iter().collect::<BTreeSet<_>>()))
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
