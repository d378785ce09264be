//! Activity logger: a bounded, non-blocking sink for one structured record
//! per decision. `submit` never blocks the decision path; on overflow the
//! oldest queued record is evicted to make room and a counter incremented.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

const CLIENT_ID_MAX: usize = 200;
const USERNAME_MAX: usize = 100;
const PEER_ADDR_MAX: usize = 50;
const TOPIC_MAX: usize = 500;
const DETAIL_MAX: usize = 1000;
const ERROR_MESSAGE_MAX: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Auth,
    Publish,
    Subscribe,
    Disconnect,
    Wakeup,
}

impl EventType {
    fn as_str(&self) -> &'static str {
        match self {
            EventType::Auth => "auth",
            EventType::Publish => "publish",
            EventType::Subscribe => "subscribe",
            EventType::Disconnect => "disconnect",
            EventType::Wakeup => "wakeup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionResult {
    Allow,
    Deny,
    Error,
}

impl DecisionResult {
    fn as_str(&self) -> &'static str {
        match self {
            DecisionResult::Allow => "allow",
            DecisionResult::Deny => "deny",
            DecisionResult::Error => "error",
        }
    }
}

/// Immutable once queued.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub result: DecisionResult,
    pub client_id: String,
    pub username: String,
    pub peer_addr: String,
    pub topic: Option<String>,
    pub detail: Option<String>,
    pub error_message: Option<String>,
    pub cache_hit: bool,
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

impl ActivityRecord {
    fn truncated(mut self) -> Self {
        self.client_id = truncate(&self.client_id, CLIENT_ID_MAX);
        self.username = truncate(&self.username, USERNAME_MAX);
        self.peer_addr = truncate(&self.peer_addr, PEER_ADDR_MAX);
        self.topic = self.topic.map(|t| truncate(&t, TOPIC_MAX));
        self.detail = self.detail.map(|d| truncate(&d, DETAIL_MAX));
        self.error_message = self.error_message.map(|e| truncate(&e, ERROR_MESSAGE_MAX));
        self
    }
}

struct Inner {
    queue: Mutex<VecDeque<ActivityRecord>>,
    capacity: usize,
    dropped_records: AtomicU64,
    notify: Notify,
}

/// Handle held by request handlers. Cloning is cheap (an `Arc` clone).
#[derive(Clone)]
pub struct ActivityLogger {
    inner: Arc<Inner>,
}

impl ActivityLogger {
    /// Spawns the background drain task and returns the handle to submit on.
    pub fn spawn(queue_capacity: usize, batch_size: usize) -> Self {
        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::with_capacity(queue_capacity)),
            capacity: queue_capacity,
            dropped_records: AtomicU64::new(0),
            notify: Notify::new(),
        });

        tokio::spawn(drain_loop(inner.clone(), batch_size));

        Self { inner }
    }

    /// Non-blocking: a short in-memory lock, never an I/O wait. If the queue
    /// is at capacity, the oldest queued record is evicted to make room for
    /// the incoming one rather than applying backpressure to the caller.
    pub fn submit(&self, record: ActivityRecord) {
        let record = record.truncated();
        let mut queue = self.inner.queue.lock().unwrap();
        if queue.len() >= self.inner.capacity {
            queue.pop_front();
            self.inner.dropped_records.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                username = %record.username,
                event_type = record.event_type.as_str(),
                "activity logger queue full, dropping oldest record"
            );
        }
        queue.push_back(record);
        drop(queue);
        self.inner.notify.notify_one();
    }

    pub fn dropped_records(&self) -> u64 {
        self.inner.dropped_records.load(Ordering::Relaxed)
    }

    pub fn queue_capacity_used(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    /// High-water mark for the liveness probe: below 90% full is healthy.
    pub fn is_below_high_water_mark(&self) -> bool {
        let capacity = self.inner.capacity;
        capacity == 0 || self.queue_capacity_used() * 10 < capacity * 9
    }
}

async fn drain_loop(inner: Arc<Inner>, batch_size: usize) {
    loop {
        inner.notify.notified().await;
        loop {
            let batch: Vec<ActivityRecord> = {
                let mut queue = inner.queue.lock().unwrap();
                if queue.is_empty() {
                    break;
                }
                let take = queue.len().min(batch_size);
                queue.drain(..take).collect()
            };

            for record in batch {
                tracing::info!(
                    target: "activity",
                    timestamp = %record.timestamp,
                    event_type = record.event_type.as_str(),
                    result = record.result.as_str(),
                    client_id = %record.client_id,
                    username = %record.username,
                    peer_addr = %record.peer_addr,
                    topic = record.topic.as_deref().unwrap_or_default(),
                    detail = record.detail.as_deref().unwrap_or_default(),
                    error_message = record.error_message.as_deref().unwrap_or_default(),
                    cache_hit = record.cache_hit,
                    "decision recorded"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(username: &str) -> ActivityRecord {
        ActivityRecord {
            timestamp: Utc::now(),
            event_type: EventType::Auth,
            result: DecisionResult::Allow,
            client_id: "c-1".to_string(),
            username: username.to_string(),
            peer_addr: "10.0.0.1".to_string(),
            topic: None,
            detail: None,
            error_message: None,
            cache_hit: false,
        }
    }

    #[tokio::test]
    async fn submit_does_not_block_even_when_queue_is_saturated() {
        let logger = ActivityLogger::spawn(1, 1);
        let start = std::time::Instant::now();
        for i in 0..1000 {
            logger.submit(sample_record(&format!("user-{i}")));
        }
        assert!(
            start.elapsed() < std::time::Duration::from_millis(500),
            "submit should never block on a saturated queue"
        );
    }

    #[tokio::test]
    async fn overflow_evicts_the_oldest_record_not_the_newest() {
        let logger = ActivityLogger::spawn(2, 1);
        logger.submit(sample_record("first"));
        logger.submit(sample_record("second"));
        logger.submit(sample_record("third"));

        let remaining: Vec<String> = logger
            .inner
            .queue
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.username.clone())
            .collect();

        assert_eq!(remaining, vec!["second".to_string(), "third".to_string()]);
        assert_eq!(logger.dropped_records(), 1);
    }

    #[test]
    fn truncation_caps_every_bounded_field() {
        let record = ActivityRecord {
            timestamp: Utc::now(),
            event_type: EventType::Publish,
            result: DecisionResult::Deny,
            client_id: "c".repeat(CLIENT_ID_MAX + 50),
            username: "u".repeat(USERNAME_MAX + 50),
            peer_addr: "p".repeat(PEER_ADDR_MAX + 50),
            topic: Some("t".repeat(TOPIC_MAX + 50)),
            detail: Some("d".repeat(DETAIL_MAX + 50)),
            error_message: Some("e".repeat(ERROR_MESSAGE_MAX + 50)),
            cache_hit: false,
        }
        .truncated();

        assert_eq!(record.client_id.len(), CLIENT_ID_MAX);
        assert_eq!(record.username.len(), USERNAME_MAX);
        assert_eq!(record.peer_addr.len(), PEER_ADDR_MAX);
        assert_eq!(record.topic.unwrap().len(), TOPIC_MAX);
        assert_eq!(record.detail.unwrap().len(), DETAIL_MAX);
        assert_eq!(record.error_message.unwrap().len(), ERROR_MESSAGE_MAX);
    }
}
