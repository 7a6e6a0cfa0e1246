use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::event_bus::{EmitOptions, EventBus};

/// Bound on retained completed/failed requests. Oldest entries are
/// evicted first once this is exceeded.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Returned by `start_request`; holds the handle a caller completes or
/// fails later.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: String,
    pub tool: String,
    pub parent_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
struct CompletedRequest {
    tool: String,
    duration_ms: u64,
    outcome: Outcome,
}

struct ActiveRequest {
    tool: String,
    parent_id: Option<String>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

/// Aggregate latency/outcome metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub avg_duration_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub by_tool: HashMap<String, ToolMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetrics {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub avg_duration_ms: f64,
}

/// Tracks in-flight and historical tool invocations, emitting
/// `request.started|completed|failed` on an `EventBus`. History is a
/// bounded FIFO so long-running processes don't grow this unbounded.
pub struct RequestTracker {
    events: Arc<EventBus>,
    max_history: usize,
    active: Mutex<HashMap<String, ActiveRequest>>,
    history: Mutex<VecDeque<CompletedRequest>>,
    next_seq: AtomicU64,
}

impl RequestTracker {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self::with_max_history(events, DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(events: Arc<EventBus>, max_history: usize) -> Self {
        Self {
            events,
            max_history: max_history.max(1),
            active: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub async fn start_request(&self, tool: impl Into<String>, args: Value, parent_id: Option<String>) -> RequestContext {
        let tool = tool.into();
        let id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        self.next_seq.fetch_add(1, Ordering::Relaxed);

        self.active.lock().insert(
            id.clone(),
            ActiveRequest {
                tool: tool.clone(),
                parent_id: parent_id.clone(),
                started_at,
                clock: Instant::now(),
            },
        );

        let _ = self
            .events
            .emit(
                "request.started",
                serde_json::json!({
                    "id": id,
                    "tool": tool,
                    "args": args,
                    "parentId": parent_id,
                }),
                EmitOptions::default(),
            )
            .await;

        RequestContext { id, tool, parent_id, started_at }
    }

    pub async fn complete_request(&self, id: &str, token_estimate: Option<u64>) {
        let active = self.active.lock().remove(id);
        let Some(active) = active else { return };
        let duration_ms = active.clock.elapsed().as_millis() as u64;
        self.push_history(CompletedRequest { tool: active.tool.clone(), duration_ms, outcome: Outcome::Success });

        let _ = self
            .events
            .emit(
                "request.completed",
                serde_json::json!({
                    "id": id,
                    "tool": active.tool,
                    "durationMs": duration_ms,
                    "tokenEstimate": token_estimate,
                }),
                EmitOptions::default(),
            )
            .await;
    }

    pub async fn fail_request(&self, id: &str, error: impl Into<String>) {
        let active = self.active.lock().remove(id);
        let Some(active) = active else { return };
        let duration_ms = active.clock.elapsed().as_millis() as u64;
        let error = error.into();
        self.push_history(CompletedRequest { tool: active.tool.clone(), duration_ms, outcome: Outcome::Failure });

        let _ = self
            .events
            .emit(
                "request.failed",
                serde_json::json!({
                    "id": id,
                    "tool": active.tool,
                    "durationMs": duration_ms,
                    "error": error,
                }),
                EmitOptions::default(),
            )
            .await;
    }

    fn push_history(&self, entry: CompletedRequest) {
        let mut history = self.history.lock();
        history.push_back(entry);
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    pub fn get_active_requests(&self) -> Vec<RequestContext> {
        self.active
            .lock()
            .iter()
            .map(|(id, req)| RequestContext {
                id: id.clone(),
                tool: req.tool.clone(),
                parent_id: req.parent_id.clone(),
                started_at: req.started_at,
            })
            .collect()
    }

    pub fn get_metrics(&self) -> RequestMetrics {
        let history = self.history.lock();
        let total = history.len();
        let success = history.iter().filter(|r| r.outcome == Outcome::Success).count();
        let failed = total - success;

        let mut durations: Vec<u64> = history.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();
        let avg_duration_ms = if total == 0 { 0.0 } else { durations.iter().sum::<u64>() as f64 / total as f64 };

        let mut by_tool: HashMap<String, (usize, usize, u64)> = HashMap::new();
        for req in history.iter() {
            let entry = by_tool.entry(req.tool.clone()).or_insert((0, 0, 0));
            entry.0 += 1;
            if req.outcome == Outcome::Success {
                entry.1 += 1;
            }
            entry.2 += req.duration_ms;
        }
        let by_tool = by_tool
            .into_iter()
            .map(|(tool, (total, success, sum))| {
                (
                    tool,
                    ToolMetrics {
                        total,
                        success,
                        failed: total - success,
                        avg_duration_ms: if total == 0 { 0.0 } else { sum as f64 / total as f64 },
                    },
                )
            })
            .collect();

        RequestMetrics {
            total,
            success,
            failed,
            avg_duration_ms,
            p50_ms: percentile(&durations, 50.0),
            p95_ms: percentile(&durations, 95.0),
            p99_ms: percentile(&durations, 99.0),
            by_tool,
        }
    }
}

/// `p` maps to index `ceil(p/100 * n) - 1`, clamped to `[0, n-1]`.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let raw = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let idx = raw.clamp(0, n as i64 - 1) as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_request_records_history_and_removes_active() {
        let tracker = RequestTracker::new(Arc::new(EventBus::new("test")));
        let ctx = tracker.start_request("search", serde_json::json!({}), None).await;
        assert_eq!(tracker.get_active_requests().len(), 1);
        tracker.complete_request(&ctx.id, Some(42)).await;
        assert_eq!(tracker.get_active_requests().len(), 0);
        let metrics = tracker.get_metrics();
        assert_eq!(metrics.total, 1);
        assert_eq!(metrics.success, 1);
        assert_eq!(metrics.failed, 0);
    }

    #[tokio::test]
    async fn fail_request_is_counted_separately_from_success() {
        let tracker = RequestTracker::new(Arc::new(EventBus::new("test")));
        let ctx = tracker.start_request("index", serde_json::json!({}), None).await;
        tracker.fail_request(&ctx.id, "boom").await;
        let metrics = tracker.get_metrics();
        assert_eq!(metrics.total, 1);
        assert_eq!(metrics.success, 0);
        assert_eq!(metrics.failed, 1);
    }

    #[tokio::test]
    async fn completing_an_unknown_id_is_a_no_op() {
        let tracker = RequestTracker::new(Arc::new(EventBus::new("test")));
        tracker.complete_request("does-not-exist", None).await;
        assert_eq!(tracker.get_metrics().total, 0);
    }

    #[tokio::test]
    async fn history_is_bounded_by_max_history_fifo() {
        let tracker = RequestTracker::with_max_history(Arc::new(EventBus::new("test")), 3);
        for _ in 0..5 {
            let ctx = tracker.start_request("tool", serde_json::json!({}), None).await;
            tracker.complete_request(&ctx.id, None).await;
        }
        assert_eq!(tracker.get_metrics().total, 3);
    }

    #[test]
    fn percentile_ordering_holds_p50_le_p95_le_p99() {
        let sorted: Vec<u64> = (1..=200).collect();
        let p50 = percentile(&sorted, 50.0);
        let p95 = percentile(&sorted, 95.0);
        let p99 = percentile(&sorted, 99.0);
        assert!(p50 <= p95);
        assert!(p95 <= p99);
        assert_eq!(p50, 100);
        assert_eq!(p99, 198);
    }

    #[test]
    fn percentile_on_single_element_returns_that_element() {
        assert_eq!(percentile(&[7], 50.0), 7);
        assert_eq!(percentile(&[7], 99.0), 7);
    }

    #[test]
    fn percentile_on_empty_returns_zero() {
        assert_eq!(percentile(&[], 50.0), 0);
    }

    #[tokio::test]
    async fn by_tool_breaks_down_metrics_per_tool() {
        let tracker = RequestTracker::new(Arc::new(EventBus::new("test")));
        let a = tracker.start_request("scan", serde_json::json!({}), None).await;
        tracker.complete_request(&a.id, None).await;
        let b = tracker.start_request("embed", serde_json::json!({}), None).await;
        tracker.fail_request(&b.id, "err").await;

        let metrics = tracker.get_metrics();
        assert_eq!(metrics.by_tool["scan"].success, 1);
        assert_eq!(metrics.by_tool["embed"].failed, 1);
    }
}
