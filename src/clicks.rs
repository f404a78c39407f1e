//! Click recording
//!
//! Best-effort analytics for the redirect path. Handlers push events onto a
//! bounded channel and a single background task drains them into storage;
//! a full channel drops the event so redirect latency is never affected.

use std::fmt::Write as _;
use std::net::IpAddr;

use chrono::NaiveDate;
use chrono::Utc;
use sha2::Digest;
use sha2::Sha256;
use tokio::sync::mpsc;
use url::Url;
use uuid::Uuid;

use crate::storage::Storage;

/// How many events may be queued before new ones are dropped
const CHANNEL_CAPACITY: usize = 1024;

/// User agents are truncated to this many characters
const MAX_USER_AGENT: usize = 512;

/// Referrers are query-stripped, then truncated to this many characters
const MAX_REFERRER: usize = 2048;

/// A single recorded click
#[derive(Clone, Debug)]
pub struct ClickEvent {
    /// The link that was followed
    pub link_id: Uuid,

    /// The authenticated user, if any
    pub user_id: Option<Uuid>,

    /// Day-salted hash of the client IP
    pub ip_hash: Option<String>,

    /// Truncated user agent
    pub user_agent: Option<String>,

    /// Query-stripped, truncated referrer
    pub referrer: Option<String>,
}

/// Handle for enqueueing click events
///
/// Cheap to clone; all clones feed the same drain task.
#[derive(Clone)]
pub struct ClickRecorder {
    sender: mpsc::Sender<ClickEvent>,
}

impl ClickRecorder {
    /// Spawn the drain task and return the producer handle
    pub fn spawn<S: Storage>(storage: S) -> Self {
        Self::with_capacity(storage, CHANNEL_CAPACITY)
    }

    /// Same as [`spawn`](Self::spawn), with an explicit queue capacity
    pub fn with_capacity<S: Storage>(storage: S, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);

        tokio::spawn(drain(storage, receiver));

        Self { sender }
    }

    /// Enqueue a click event without blocking
    ///
    /// A full queue drops the event; the caller never sees an error.
    pub fn record(&self, event: ClickEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::warn!("Dropping click event: {err}");
        }
    }
}

/// Drain loop, one per recorder
///
/// Runs until every producer handle is dropped.
async fn drain<S: Storage>(storage: S, mut receiver: mpsc::Receiver<ClickEvent>) {
    while let Some(event) = receiver.recv().await {
        if let Err(err) = storage.record_click(&event).await {
            tracing::warn!("Could not persist click event: {err}");
        }
    }
}

/// Hash a client IP, salted by the current UTC calendar day
///
/// Stable within a day, unlinkable across days without the raw IP.
pub fn hash_ip(ip_address: &IpAddr) -> String {
    hash_ip_for_day(ip_address, Utc::now().date_naive())
}

fn hash_ip_for_day(ip_address: &IpAddr, day: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip_address.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(day.format("%Y%m%d").to_string().as_bytes());

    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Truncate a user agent to its storable size
pub fn clean_user_agent(user_agent: &str) -> String {
    truncate_chars(user_agent, MAX_USER_AGENT)
}

/// Strip query and fragment from a referrer and truncate it
///
/// Unparseable referrers are kept as-is, only truncated.
pub fn clean_referrer(referrer: &str) -> String {
    let stripped = match Url::parse(referrer) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => referrer.to_string(),
    };

    truncate_chars(&stripped, MAX_REFERRER)
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
