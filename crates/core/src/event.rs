//! Typed build events and the process-wide event bus
//!
//! Builds report progress as [`Message`] values on two topics: one for
//! runlist-level lifecycle, one for per-command execution. Dispatch is
//! synchronous and in subscription order, so a slow subscriber throttles
//! the publisher instead of silently dropping output.
//!
//! The bus is in-process only; nothing is persisted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;

/// Topic for runlist-level lifecycle messages.
pub const TOPIC_PROVISION: &str = "runlists.provision";

/// Topic for per-command messages.
pub const TOPIC_PROVISION_TASK: &str = "runlists.provision.task";

/// Execution state a message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecStatus {
    Started,
    Cached,
    ExecStart,
    ExecFinished,
    Error,
}

/// A single build event.
///
/// Command-level messages carry the task name, the command's checksum and
/// its log label; runlist-level messages leave those empty. Streamed output
/// rides in `line`, one message per line as it arrives.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub topic: &'static str,
    pub hostname: String,
    pub task: String,
    pub checksum: String,
    pub message: String,
    pub status: ExecStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

impl Message {
    /// A runlist-level lifecycle message.
    pub fn runlist(hostname: &str, status: ExecStatus) -> Self {
        Self {
            topic: TOPIC_PROVISION,
            hostname: hostname.to_string(),
            task: String::new(),
            checksum: String::new(),
            message: String::new(),
            status,
            error: None,
            line: None,
        }
    }

    /// A per-command message.
    pub fn command(hostname: &str, task: &str, checksum: &str, label: &str, status: ExecStatus) -> Self {
        Self {
            topic: TOPIC_PROVISION_TASK,
            hostname: hostname.to_string(),
            task: task.to_string(),
            checksum: checksum.to_string(),
            message: label.to_string(),
            status,
            error: None,
            line: None,
        }
    }

    pub fn with_error(mut self, error: &impl std::fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.line = Some(line.into());
        self
    }
}

type Callback = Arc<dyn Fn(&Message) + Send + Sync + 'static>;

/// Synchronous publish/subscribe point for build events.
///
/// Cloning is cheap and shares the subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, invoked for every later publish.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));
        SubscriptionId(id)
    }

    /// Remove a subscriber. Safe to call from inside any subscriber; the
    /// in-flight publish still delivers to the snapshot it started with.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .retain(|(sid, _)| *sid != id.0);
    }

    /// Deliver `message` to every subscriber, in subscription order.
    ///
    /// Returns only after the last subscriber returns.
    pub fn publish(&self, message: &Message) {
        let subscribers: Vec<Callback> = self
            .inner
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in subscribers {
            callback(message);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }
}

/// The process-wide bus, initialized on first use.
///
/// Builds publish here by default; tests inject their own bus instead.
pub fn global() -> &'static EventBus {
    static GLOBAL: OnceLock<EventBus> = OnceLock::new();
    GLOBAL.get_or_init(EventBus::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(bus: &EventBus) -> Arc<Mutex<Vec<Message>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |message| sink.lock().unwrap().push(message.clone()));
        seen
    }

    #[test]
    fn publish_reaches_subscribers_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe(move |_| order.lock().unwrap().push(tag));
        }

        bus.publish(&Message::runlist("host", ExecStatus::Started));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = collect(&bus);
        let extra = bus.subscribe(|_| {});
        assert_eq!(bus.subscriber_count(), 2);

        bus.unsubscribe(extra);
        bus.publish(&Message::runlist("host", ExecStatus::Started));

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unsubscribe_from_inside_a_subscriber() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let bus_handle = bus.clone();
        let id_slot = slot.clone();
        let id = bus.subscribe(move |_| {
            if let Some(id) = *id_slot.lock().unwrap() {
                bus_handle.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);
        let seen = collect(&bus);

        bus.publish(&Message::runlist("host", ExecStatus::Started));
        bus.publish(&Message::runlist("host", ExecStatus::ExecFinished));

        // The self-removing subscriber never blocked the later one.
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn clones_share_subscribers() {
        let bus = EventBus::new();
        let seen = collect(&bus);

        bus.clone().publish(&Message::runlist("host", ExecStatus::Started));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn global_bus_is_a_singleton() {
        assert!(std::ptr::eq(global(), global()));
    }

    #[test]
    fn status_serializes_kebab_case() {
        let message = Message::command("host", "base", "abc", "uptime", ExecStatus::ExecStart);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["status"], "exec-start");
        assert_eq!(json["topic"], "runlists.provision.task");
        assert!(json.get("error").is_none());
    }
}
