//! Live log subscription: wires a core log feed into the [`LogStore`]
//!
//! A subscription is keyed by server address, secret and level. [`LiveLogs`]
//! keeps at most one feed open and replaces it whenever the key changes.
//! Every feed owns an [`AliveToken`]; teardown kills the token before the
//! transport is closed, and the [`FeedSink`] only writes to the store while
//! holding the token alive, so nothing reaches the store after teardown.
//!
//! The optional history batch is fetched by the transport, off the caller's
//! thread, and replaces the level's entries before live messages are applied.

use crate::{ConnectionInfo, LogEntry, LogLevel, LogRecord, LogStore, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Lifecycle notifications for the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Connected { url: String },
    Failed { url: String, reason: String },
    Closed { url: String },
    HistoryFailed { reason: String },
}

/// Cancellation handle shared by a subscription and its transport
#[derive(Debug, Clone)]
pub struct AliveToken(Arc<RwLock<bool>>);

impl Default for AliveToken {
    fn default() -> Self {
        Self::new()
    }
}

impl AliveToken {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        *self.0.read()
    }

    /// Mark the subscription dead. Waits for a write in progress to finish.
    /// Returns whether the token was still alive.
    pub fn kill(&self) -> bool {
        let mut alive = self.0.write();
        std::mem::replace(&mut *alive, false)
    }

    /// Run `f` only if still alive, holding off `kill` until it returns
    pub fn run_if_alive<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let alive = self.0.read();
        if *alive {
            Some(f())
        } else {
            None
        }
    }
}

/// Receiving end handed to a transport for one subscription
#[derive(Clone)]
pub struct FeedSink {
    token: AliveToken,
    store: LogStore,
    level: LogLevel,
    url: String,
    events: Option<Sender<FeedEvent>>,
    history: Option<Arc<dyn LogHistory>>,
}

impl FeedSink {
    pub fn new(
        token: AliveToken,
        store: LogStore,
        level: LogLevel,
        url: impl Into<String>,
        events: Option<Sender<FeedEvent>>,
    ) -> Self {
        Self {
            token,
            store,
            level,
            url: url.into(),
            events,
            history: None,
        }
    }

    pub fn with_history(mut self, history: Option<Arc<dyn LogHistory>>) -> Self {
        self.history = history;
        self
    }

    pub fn has_history(&self) -> bool {
        self.history.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.token.is_alive()
    }

    /// Handle one raw socket message.
    ///
    /// Returns `Ok(false)` when the subscription was torn down and the message
    /// was dropped, and an error when the message is not a log record.
    pub fn deliver(&self, raw: &str) -> Result<bool> {
        if !self.is_alive() {
            return Ok(false);
        }
        let record = LogRecord::from_json(raw)?;
        Ok(self.deliver_record(record))
    }

    pub fn deliver_record(&self, record: LogRecord) -> bool {
        let entry = LogEntry::received_now(record);
        self.token
            .run_if_alive(|| self.store.append(self.level, entry))
            .is_some()
    }

    /// Replace the level's entries with a historical batch
    pub fn deliver_history(&self, records: Vec<LogRecord>) -> bool {
        let entries: Vec<_> = records.into_iter().map(LogEntry::received_now).collect();
        let count = entries.len();
        let replaced = self
            .token
            .run_if_alive(|| self.store.replace(self.level, entries))
            .is_some();
        if replaced {
            log::debug!("Loaded {} historical log entries for {}", count, self.level);
        }
        replaced
    }

    /// Fetch the history batch, if a source is installed, and deliver it.
    ///
    /// Blocks on the fetch; transports call this from a worker, before
    /// applying live messages. A failed fetch is reported and the feed
    /// carries on.
    pub fn load_history(&self) -> bool {
        let Some(history) = &self.history else {
            return false;
        };
        match history.fetch() {
            Ok(records) => self.deliver_history(records),
            Err(e) => {
                if self.is_alive() {
                    log::warn!("Failed to fetch log history: {}", e);
                    self.emit(FeedEvent::HistoryFailed {
                        reason: e.to_string(),
                    });
                }
                false
            }
        }
    }

    pub fn opened(&self) {
        if self.is_alive() {
            log::debug!("Log feed connected: {}", redact(&self.url));
            self.emit(FeedEvent::Connected {
                url: self.url.clone(),
            });
        }
    }

    /// Transport failure; the feed is dead from here on
    pub fn fail(&self, reason: impl fmt::Display) {
        if self.token.kill() {
            log::error!("Log feed {} failed: {}", redact(&self.url), reason);
            self.emit(FeedEvent::Failed {
                url: self.url.clone(),
                reason: reason.to_string(),
            });
        }
    }

    /// The remote end closed the feed
    pub fn closed(&self) {
        if self.token.kill() {
            log::debug!("Log feed closed by core: {}", redact(&self.url));
            self.emit(FeedEvent::Closed {
                url: self.url.clone(),
            });
        }
    }

    fn emit(&self, event: FeedEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Opens log feeds. The transport drives `sink` until its handle is closed.
pub trait FeedConnector {
    type Handle: FeedHandle;

    fn open(&self, url: &str, sink: FeedSink) -> Self::Handle;
}

pub trait FeedHandle {
    fn close(self);
}

/// Source of the log batch shown before live entries arrive
pub trait LogHistory: Send + Sync {
    fn fetch(&self) -> Result<Vec<LogRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionKey {
    pub server: String,
    pub secret: String,
    pub level: LogLevel,
}

impl SubscriptionKey {
    pub fn url(&self) -> String {
        ConnectionInfo::new(self.server.clone(), self.secret.clone()).logs_url(self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Logging disabled or no connection info
    Idle,
    Open { url: String, level: LogLevel },
    /// The feed ended on its own; it is not reopened until the key changes
    Closed { url: String, level: LogLevel },
}

struct ActiveFeed<H> {
    key: SubscriptionKey,
    url: String,
    token: AliveToken,
    handle: H,
}

/// Keeps the store fed from at most one live subscription
pub struct LiveLogs<C: FeedConnector> {
    connector: C,
    store: LogStore,
    history: Option<Arc<dyn LogHistory>>,
    events: Option<Sender<FeedEvent>>,
    active: Option<ActiveFeed<C::Handle>>,
}

impl<C: FeedConnector> LiveLogs<C> {
    pub fn new(connector: C, store: LogStore) -> Self {
        Self {
            connector,
            store,
            history: None,
            events: None,
            active: None,
        }
    }

    pub fn with_events(mut self, events: Sender<FeedEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_history(mut self, history: impl LogHistory + 'static) -> Self {
        self.history = Some(Arc::new(history));
        self
    }

    /// Bring the subscription in line with the current settings.
    ///
    /// Returns `true` when a feed was closed or opened.
    pub fn sync(&mut self, enabled: bool, info: Option<&ConnectionInfo>, level: LogLevel) -> bool {
        let desired = match info {
            Some(info) if enabled => Some(SubscriptionKey {
                server: info.server.clone(),
                secret: info.secret.clone(),
                level,
            }),
            _ => None,
        };

        if self.active.as_ref().map(|a| &a.key) == desired.as_ref() {
            return false;
        }

        self.teardown();
        if let Some(key) = desired {
            self.open(key);
        }
        true
    }

    /// Close the current feed, if any
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    pub fn state(&self) -> SubscriptionState {
        match &self.active {
            None => SubscriptionState::Idle,
            Some(active) if active.token.is_alive() => SubscriptionState::Open {
                url: active.url.clone(),
                level: active.key.level,
            },
            Some(active) => SubscriptionState::Closed {
                url: active.url.clone(),
                level: active.key.level,
            },
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state(), SubscriptionState::Open { .. })
    }

    fn open(&mut self, key: SubscriptionKey) {
        let url = key.url();
        let token = AliveToken::new();
        let sink = FeedSink::new(
            token.clone(),
            self.store.clone(),
            key.level,
            url.clone(),
            self.events.clone(),
        )
        .with_history(self.history.clone());

        log::debug!("Opening log feed: {}", redact(&url));
        let handle = self.connector.open(&url, sink);
        self.active = Some(ActiveFeed {
            key,
            url,
            token,
            handle,
        });
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.kill();
            active.handle.close();
            log::debug!("Closed log feed: {}", redact(&active.url));
        }
    }
}

impl<C: FeedConnector> Drop for LiveLogs<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Hide the token query parameter in log output
fn redact(url: &str) -> String {
    match (url.find("token="), url.find("&level=")) {
        (Some(start), Some(end)) if start < end => {
            format!("{}token=***{}", &url[..start], &url[end..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::channel;

    #[derive(Default)]
    struct Recorded {
        opened: Vec<String>,
        closed: Vec<String>,
        sinks: Vec<FeedSink>,
    }

    #[derive(Clone, Default)]
    struct MockConnector {
        recorded: Arc<Mutex<Recorded>>,
    }

    struct MockHandle {
        url: String,
        recorded: Arc<Mutex<Recorded>>,
    }

    impl FeedConnector for MockConnector {
        type Handle = MockHandle;

        fn open(&self, url: &str, sink: FeedSink) -> MockHandle {
            let mut recorded = self.recorded.lock();
            recorded.opened.push(url.to_string());
            recorded.sinks.push(sink);
            MockHandle {
                url: url.to_string(),
                recorded: self.recorded.clone(),
            }
        }
    }

    impl FeedHandle for MockHandle {
        fn close(self) {
            self.recorded.lock().closed.push(self.url);
        }
    }

    impl MockConnector {
        fn sink(&self, index: usize) -> FeedSink {
            self.recorded.lock().sinks[index].clone()
        }

        fn opened(&self) -> Vec<String> {
            self.recorded.lock().opened.clone()
        }

        fn closed(&self) -> Vec<String> {
            self.recorded.lock().closed.clone()
        }
    }

    struct FixedHistory(Vec<LogRecord>);

    impl LogHistory for FixedHistory {
        fn fetch(&self) -> Result<Vec<LogRecord>> {
            Ok(self.0.clone())
        }
    }

    struct CountingHistory(Arc<AtomicUsize>);

    impl LogHistory for CountingHistory {
        fn fetch(&self) -> Result<Vec<LogRecord>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct BrokenHistory;

    impl LogHistory for BrokenHistory {
        fn fetch(&self) -> Result<Vec<LogRecord>> {
            Err(Error::history("connection refused"))
        }
    }

    const LINE: &str =
        r#"{"type":"info","payload":"[TCP] 1.2.3.4:80(curl) --> example.com:443 match DOMAIN(abc) using DIRECT"}"#;

    fn info() -> ConnectionInfo {
        ConnectionInfo::new("127.0.0.1:9097", "secret")
    }

    #[test]
    fn test_idle_until_enabled_with_info() {
        let connector = MockConnector::default();
        let mut live = LiveLogs::new(connector.clone(), LogStore::new());

        assert!(!live.sync(false, Some(&info()), LogLevel::Info));
        assert!(!live.sync(true, None, LogLevel::Info));
        assert_eq!(live.state(), SubscriptionState::Idle);
        assert!(connector.opened().is_empty());

        assert!(live.sync(true, Some(&info()), LogLevel::Info));
        assert!(live.is_open());
        assert_eq!(
            connector.opened(),
            vec!["ws://127.0.0.1:9097/logs?token=secret&level=info"]
        );
    }

    #[test]
    fn test_same_key_is_noop() {
        let connector = MockConnector::default();
        let mut live = LiveLogs::new(connector.clone(), LogStore::new());
        live.sync(true, Some(&info()), LogLevel::Error);
        assert!(!live.sync(true, Some(&info()), LogLevel::Error));
        assert_eq!(connector.opened().len(), 1);
        assert!(connector.closed().is_empty());
    }

    #[test]
    fn test_delivery_appends_parsed_entry() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let mut live = LiveLogs::new(connector.clone(), store.clone());
        live.sync(true, Some(&info()), LogLevel::Info);

        assert!(connector.sink(0).deliver(LINE).unwrap());
        let entries = store.get(LogLevel::Info);
        assert_eq!(entries.len(), 1);
        let detail = entries[0].detail.as_ref().unwrap();
        assert_eq!(detail.process_name.as_deref(), Some("curl"));
        assert_eq!(entries[0].time.len(), "01-02 03:04:05".len());
    }

    #[test]
    fn test_malformed_message_is_recoverable() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let mut live = LiveLogs::new(connector.clone(), store.clone());
        live.sync(true, Some(&info()), LogLevel::Info);

        let sink = connector.sink(0);
        assert!(matches!(sink.deliver("{oops"), Err(Error::Decode(_))));
        assert!(sink.is_alive());
        assert!(sink.deliver(LINE).unwrap());
        assert_eq!(store.len(LogLevel::Info), 1);
    }

    #[test]
    fn test_no_append_after_teardown() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let mut live = LiveLogs::new(connector.clone(), store.clone());
        live.sync(true, Some(&info()), LogLevel::Info);
        let sink = connector.sink(0);

        live.shutdown();
        assert_eq!(live.state(), SubscriptionState::Idle);
        assert_eq!(connector.closed().len(), 1);

        let revision = store.revision();
        assert!(!sink.deliver(LINE).unwrap());
        assert!(!sink.deliver_record(LogRecord::new("info", "late")));
        assert!(store.is_empty(LogLevel::Info));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_level_change_swaps_exactly_one_feed() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let mut live = LiveLogs::new(connector.clone(), store.clone());

        live.sync(true, Some(&info()), LogLevel::Info);
        let old_sink = connector.sink(0);
        assert!(live.sync(true, Some(&info()), LogLevel::All));

        assert_eq!(
            connector.opened(),
            vec![
                "ws://127.0.0.1:9097/logs?token=secret&level=info",
                "ws://127.0.0.1:9097/logs?token=secret&level=debug",
            ]
        );
        assert_eq!(
            connector.closed(),
            vec!["ws://127.0.0.1:9097/logs?token=secret&level=info"]
        );

        assert!(!old_sink.deliver(LINE).unwrap());
        assert!(store.is_empty(LogLevel::Info));

        assert!(connector.sink(1).deliver(LINE).unwrap());
        assert_eq!(store.len(LogLevel::All), 1);
        assert_eq!(
            live.state(),
            SubscriptionState::Open {
                url: "ws://127.0.0.1:9097/logs?token=secret&level=debug".into(),
                level: LogLevel::All,
            }
        );
    }

    #[test]
    fn test_disable_and_info_loss_close_feed() {
        let connector = MockConnector::default();
        let mut live = LiveLogs::new(connector.clone(), LogStore::new());

        live.sync(true, Some(&info()), LogLevel::Info);
        assert!(live.sync(false, Some(&info()), LogLevel::Info));
        assert_eq!(live.state(), SubscriptionState::Idle);

        live.sync(true, Some(&info()), LogLevel::Info);
        assert!(live.sync(true, None, LogLevel::Info));
        assert_eq!(connector.opened().len(), 2);
        assert_eq!(connector.closed().len(), 2);
    }

    #[test]
    fn test_secret_change_reopens() {
        let connector = MockConnector::default();
        let mut live = LiveLogs::new(connector.clone(), LogStore::new());
        live.sync(true, Some(&info()), LogLevel::Info);
        live.sync(true, Some(&ConnectionInfo::new("127.0.0.1:9097", "other")), LogLevel::Info);
        assert_eq!(
            connector.opened().last().unwrap(),
            "ws://127.0.0.1:9097/logs?token=other&level=info"
        );
        assert_eq!(connector.closed().len(), 1);
    }

    #[test]
    fn test_transport_error_closes_without_reconnect() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let (tx, rx) = channel();
        let mut live = LiveLogs::new(connector.clone(), store.clone()).with_events(tx);
        live.sync(true, Some(&info()), LogLevel::Warning);

        let sink = connector.sink(0);
        sink.opened();
        sink.fail("connection reset");
        assert!(matches!(live.state(), SubscriptionState::Closed { .. }));
        assert!(!sink.deliver(LINE).unwrap());

        // Unchanged settings do not retry
        assert!(!live.sync(true, Some(&info()), LogLevel::Warning));
        assert_eq!(connector.opened().len(), 1);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events[0], FeedEvent::Connected { .. }));
        assert!(matches!(
            &events[1],
            FeedEvent::Failed { reason, .. } if reason == "connection reset"
        ));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_history_loads_before_live_entries() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let history = FixedHistory(vec![
            LogRecord::new("info", "first"),
            LogRecord::new("info", "second"),
        ]);
        let mut live = LiveLogs::new(connector.clone(), store.clone()).with_history(history);
        live.sync(true, Some(&info()), LogLevel::Info);

        let sink = connector.sink(0);
        assert!(sink.has_history());
        assert!(sink.load_history());
        sink.deliver(LINE).unwrap();

        let payloads: Vec<_> = store.get(LogLevel::Info).into_iter().map(|e| e.payload).collect();
        assert_eq!(payloads[..2], ["first".to_string(), "second".to_string()]);
        assert_eq!(payloads.len(), 3);
    }

    #[test]
    fn test_reopening_does_not_duplicate_history() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let history = FixedHistory(vec![LogRecord::new("info", "a"), LogRecord::new("info", "b")]);
        let mut live = LiveLogs::new(connector.clone(), store.clone()).with_history(history);

        live.sync(true, Some(&info()), LogLevel::Info);
        connector.sink(0).load_history();
        live.sync(false, Some(&info()), LogLevel::Info);
        live.sync(true, Some(&info()), LogLevel::Info);
        connector.sink(1).load_history();

        let payloads: Vec<_> = store.get(LogLevel::Info).into_iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec!["a", "b"]);
    }

    #[test]
    fn test_sync_does_not_fetch_history() {
        let calls = Arc::new(AtomicUsize::new(0));
        let connector = MockConnector::default();
        let mut live = LiveLogs::new(connector.clone(), LogStore::new())
            .with_history(CountingHistory(calls.clone()));

        live.sync(true, Some(&info()), LogLevel::Info);
        live.sync(true, Some(&info()), LogLevel::Error);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        connector.sink(1).load_history();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_history_after_teardown_is_dropped() {
        let connector = MockConnector::default();
        let store = LogStore::new();
        let history = FixedHistory(vec![LogRecord::new("info", "stale")]);
        let mut live = LiveLogs::new(connector.clone(), store.clone()).with_history(history);
        live.sync(true, Some(&info()), LogLevel::Info);
        live.shutdown();

        assert!(!connector.sink(0).load_history());
        assert!(store.is_empty(LogLevel::Info));
    }

    #[test]
    fn test_history_failure_is_reported_not_fatal() {
        let connector = MockConnector::default();
        let (tx, rx) = channel();
        let mut live = LiveLogs::new(connector.clone(), LogStore::new())
            .with_events(tx)
            .with_history(BrokenHistory);
        live.sync(true, Some(&info()), LogLevel::Info);

        assert!(!connector.sink(0).load_history());
        assert!(live.is_open());
        assert!(matches!(
            rx.try_recv().unwrap(),
            FeedEvent::HistoryFailed { .. }
        ));
    }

    #[test]
    fn test_no_history_source() {
        let connector = MockConnector::default();
        let mut live = LiveLogs::new(connector.clone(), LogStore::new());
        live.sync(true, Some(&info()), LogLevel::Info);
        assert!(!connector.sink(0).has_history());
        assert!(!connector.sink(0).load_history());
    }

    #[test]
    fn test_drop_closes_feed() {
        let connector = MockConnector::default();
        {
            let mut live = LiveLogs::new(connector.clone(), LogStore::new());
            live.sync(true, Some(&info()), LogLevel::Info);
        }
        assert_eq!(connector.closed().len(), 1);
        assert!(!connector.sink(0).is_alive());
    }

    #[test]
    fn test_redact_hides_token() {
        assert_eq!(
            redact("ws://h:1/logs?token=abc&level=info"),
            "ws://h:1/logs?token=***&level=info"
        );
        assert_eq!(redact("ws://h:1/other"), "ws://h:1/other");
    }
}
