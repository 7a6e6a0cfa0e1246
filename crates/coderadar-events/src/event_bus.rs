use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{EventError, Result};

/// Every event carries this envelope plus a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub name: String,
    pub payload: Value,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<(), String>> + Send>>;
pub type HandlerFn = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Default deadline for `emit(waitForHandlers=true)`.
pub const DEFAULT_WAIT_FOR_HANDLERS_TIMEOUT: Duration = Duration::from_secs(30);

struct Subscription {
    id: u64,
    priority: i32,
    once: bool,
    handler: HandlerFn,
}

/// Options for `emit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    pub wait_for_handlers: bool,
    pub timeout: Option<Duration>,
}

/// Options for `on`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    pub priority: i32,
    pub once: bool,
}

/// Unsubscribe handle returned by `on`/`once`; `off` via `EventBus::off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Pub/sub of lifecycle events with priority handlers and an optional
/// await-all-handlers emission mode. Single dispatcher: handlers for a
/// given `emit` are invoked in descending-priority order; fire-and-forget
/// handlers run on spawned tasks so `emit` returns immediately after
/// scheduling them.
pub struct EventBus {
    source: String,
    subscriptions: Mutex<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_subscription_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn on(&self, name: impl Into<String>, options: SubscribeOptions, handler: HandlerFn) -> SubscriptionId {
        let id = self.next_subscription_id();
        let sub = Subscription {
            id,
            priority: options.priority,
            once: options.once,
            handler,
        };
        let mut subs = self.subscriptions.lock();
        let entry = subs.entry(name.into()).or_default();
        entry.push(sub);
        entry.sort_by(|a, b| b.priority.cmp(&a.priority));
        SubscriptionId(id)
    }

    pub fn once(&self, name: impl Into<String>, handler: HandlerFn) -> SubscriptionId {
        self.on(name, SubscribeOptions { priority: 0, once: true }, handler)
    }

    pub fn off(&self, name: &str, id: SubscriptionId) {
        let mut subs = self.subscriptions.lock();
        if let Some(list) = subs.get_mut(name) {
            list.retain(|s| s.id != id.0);
        }
    }

    pub fn remove_all_listeners(&self, name: Option<&str>) {
        let mut subs = self.subscriptions.lock();
        match name {
            Some(name) => {
                subs.remove(name);
            }
            None => subs.clear(),
        }
    }

    fn handlers_for(&self, name: &str) -> Vec<(u64, bool, HandlerFn)> {
        let subs = self.subscriptions.lock();
        subs.get(name)
            .map(|list| list.iter().map(|s| (s.id, s.once, s.handler.clone())).collect())
            .unwrap_or_default()
    }

    fn drop_once_handlers(&self, name: &str, fired_ids: &[u64]) {
        let mut subs = self.subscriptions.lock();
        if let Some(list) = subs.get_mut(name) {
            list.retain(|s| !fired_ids.contains(&s.id));
        }
    }

    fn build_event(&self, name: &str, payload: Value) -> Event {
        Event {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source: self.source.clone(),
            name: name.to_string(),
            payload,
        }
    }

    /// Emit an event. Default mode is fire-and-forget: returns as soon as
    /// handlers are scheduled. `waitForHandlers=true` awaits them all,
    /// bounded by `timeout` (default 30s); handlers in flight at the
    /// deadline keep running, but the call returns a timeout error.
    pub async fn emit(&self, name: &str, payload: Value, options: EmitOptions) -> Result<()> {
        let event = self.build_event(name, payload);
        let handlers = self.handlers_for(name);
        let once_ids: Vec<u64> = handlers.iter().filter(|(_, once, _)| *once).map(|(id, _, _)| *id).collect();
        if !once_ids.is_empty() {
            self.drop_once_handlers(name, &once_ids);
        }

        if handlers.is_empty() {
            return Ok(());
        }

        if options.wait_for_handlers {
            let timeout = options.timeout.unwrap_or(DEFAULT_WAIT_FOR_HANDLERS_TIMEOUT);
            let event_name = name.to_string();
            let fut = async move {
                for (_, _, handler) in handlers {
                    if let Err(reason) = handler(event.clone()).await {
                        tracing::warn!(event = %event.name, %reason, "event handler failed");
                    }
                }
            };
            tokio::time::timeout(timeout, fut).await.map_err(|_| EventError::Timeout {
                event: event_name,
                elapsed_ms: timeout.as_millis() as u64,
            })?;
            Ok(())
        } else {
            for (_, _, handler) in handlers {
                let event = event.clone();
                tokio::spawn(async move {
                    if let Err(reason) = handler(event.clone()).await {
                        tracing::warn!(event = %event.name, %reason, "event handler failed");
                    }
                });
            }
            Ok(())
        }
    }

    /// Await the next emission of `name`, or time out. Implemented as a
    /// one-shot `once` subscription wired to a oneshot channel.
    pub async fn wait_for(&self, name: &str, timeout: Option<Duration>) -> Result<Event> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        self.once(
            name,
            Arc::new(move |event: Event| {
                let tx = tx.clone();
                Box::pin(async move {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(event);
                    }
                    Ok(())
                })
            }),
        );
        let timeout = timeout.unwrap_or(DEFAULT_WAIT_FOR_HANDLERS_TIMEOUT);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Ok(event),
            _ => Err(EventError::WaitForTimeout {
                event: name.to_string(),
                elapsed_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: Arc<AtomicUsize>) -> HandlerFn {
        Arc::new(move |_event: Event| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn once_handler_runs_exactly_once_across_two_emits() {
        let bus = EventBus::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        bus.once("index.updated", counting_handler(calls.clone()));

        bus.emit("index.updated", Value::Null, EmitOptions { wait_for_handlers: true, timeout: None }).await.unwrap();
        bus.emit("index.updated", Value::Null, EmitOptions { wait_for_handlers: true, timeout: None }).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handlers_run_in_descending_priority_order() {
        let bus = EventBus::new("test");
        let order = Arc::new(Mutex::new(Vec::new()));

        for (priority, label) in [(1, "low"), (10, "high"), (5, "mid")] {
            let order = order.clone();
            bus.on(
                "evt",
                SubscribeOptions { priority, once: false },
                Arc::new(move |_event: Event| {
                    let order = order.clone();
                    Box::pin(async move {
                        order.lock().push(label);
                        Ok(())
                    })
                }),
            );
        }

        bus.emit("evt", Value::Null, EmitOptions { wait_for_handlers: true, timeout: None }).await.unwrap();
        assert_eq!(*order.lock(), vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn wait_for_handlers_timeout_does_not_crash_emitter() {
        let bus = EventBus::new("test");
        bus.on(
            "slow",
            SubscribeOptions::default(),
            Arc::new(|_event: Event| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                })
            }),
        );
        let result = bus
            .emit("slow", Value::Null, EmitOptions { wait_for_handlers: true, timeout: Some(Duration::from_millis(5)) })
            .await;
        assert!(matches!(result, Err(EventError::Timeout { .. })));
    }

    #[tokio::test]
    async fn wait_for_resolves_on_matching_emit() {
        let bus = Arc::new(EventBus::new("test"));
        let bus2 = bus.clone();
        let waiter = tokio::spawn(async move { bus2.wait_for("ready", Some(Duration::from_millis(500))).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.emit("ready", serde_json::json!({"ok": true}), EmitOptions::default()).await.unwrap();
        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.name, "ready");
    }

    #[tokio::test]
    async fn off_removes_handler() {
        let bus = EventBus::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let id = bus.on("evt", SubscribeOptions::default(), counting_handler(calls.clone()));
        bus.off("evt", id);
        bus.emit("evt", Value::Null, EmitOptions { wait_for_handlers: true, timeout: None }).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn emit_with_no_handlers_is_a_no_op() {
        let bus = EventBus::new("test");
        bus.emit("nobody.listens", Value::Null, EmitOptions::default()).await.unwrap();
    }
}
