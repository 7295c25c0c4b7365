//! Span tree logger

use opentelemetry::KeyValue;
use opentelemetry::trace::{SpanId, TraceId};
use parking_lot::Mutex;
use perfscope_core::trace::{SpanExporter, SpanRecord};
use std::collections::{HashMap, HashSet, VecDeque};

/// Traces buffered before the oldest one is flushed flat
pub const DEFAULT_MAX_PENDING_TRACES: usize = 1024;

#[derive(Default)]
struct PendingTraces {
    order: VecDeque<TraceId>,
    spans: HashMap<TraceId, Vec<SpanRecord>>,
    /// Traces whose root was already logged, oldest first
    rendered_order: VecDeque<TraceId>,
    rendered: HashSet<TraceId>,
}

impl PendingTraces {
    fn mark_rendered(&mut self, trace_id: TraceId, limit: usize) {
        if !self.rendered.insert(trace_id) {
            return;
        }
        self.rendered_order.push_back(trace_id);
        while self.rendered_order.len() > limit {
            if let Some(oldest) = self.rendered_order.pop_front() {
                self.rendered.remove(&oldest);
            }
        }
    }
}

/// Logs each finished trace as an indented tree
///
/// Spans are buffered per trace until the root span ends; the whole tree is
/// then logged, one line per span, children indented two spaces under their
/// parent. Spans of a trace whose root was already logged are logged on their
/// own as soon as they end.
pub struct NiceLoggingSpanExporter {
    pending: Mutex<PendingTraces>,
    max_pending: usize,
}

impl Default for NiceLoggingSpanExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl NiceLoggingSpanExporter {
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING_TRACES)
    }

    /// Bound the number of traces waiting for their root span, and of
    /// finished traces remembered for late children
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: Mutex::new(PendingTraces::default()),
            max_pending: max_pending.max(1),
        }
    }

    /// Number of traces still waiting for their root span
    pub fn pending_traces(&self) -> usize {
        self.pending.lock().spans.len()
    }

    /// Buffer a span and return the lines that are ready to be logged
    pub(crate) fn accept(&self, span: &SpanRecord) -> Vec<String> {
        let mut pending = self.pending.lock();

        if span.is_root() {
            let mut spans = pending.spans.remove(&span.trace_id).unwrap_or_default();
            pending.order.retain(|id| *id != span.trace_id);
            spans.push(span.clone());
            pending.mark_rendered(span.trace_id, self.max_pending);
            return render_tree(span.span_id, &spans);
        }

        if pending.rendered.contains(&span.trace_id) {
            return vec![span_line(span, 1)];
        }

        if !pending.spans.contains_key(&span.trace_id) {
            pending.order.push_back(span.trace_id);
        }
        pending
            .spans
            .entry(span.trace_id)
            .or_default()
            .push(span.clone());

        let mut lines = Vec::new();
        while pending.spans.len() > self.max_pending {
            let Some(oldest) = pending.order.pop_front() else {
                break;
            };
            if let Some(spans) = pending.spans.remove(&oldest) {
                tracing::debug!(trace_id = %oldest, spans = spans.len(), "root span never ended, logging trace flat");
                lines.extend(spans.iter().map(|s| span_line(s, 0)));
            }
        }
        lines
    }
}

impl NiceLoggingSpanExporter {
    /// Take every trace still waiting for its root, as flat lines
    pub(crate) fn drain_pending(&self) -> Vec<String> {
        let mut pending = self.pending.lock();
        let order = std::mem::take(&mut pending.order);

        let mut lines = Vec::new();
        for trace_id in order {
            if let Some(spans) = pending.spans.remove(&trace_id) {
                lines.extend(spans.iter().map(|s| span_line(s, 0)));
            }
        }
        lines
    }

    /// Log every trace still waiting for its root span
    pub fn flush(&self) {
        let lines = self.drain_pending();
        if !lines.is_empty() {
            tracing::debug!(lines = lines.len(), "logging unfinished traces flat");
        }
        for line in lines {
            tracing::info!(target: "perfscope::console", "{}", line);
        }
    }
}

impl SpanExporter for NiceLoggingSpanExporter {
    fn export_span(&self, span: &SpanRecord) {
        for line in self.accept(span) {
            tracing::info!(target: "perfscope::console", "{}", line);
        }
    }
}

/// One span: `<indent><name> <ms>ms [k=v ...]`
pub fn span_line(span: &SpanRecord, depth: usize) -> String {
    let mut line = format!(
        "{}{} {}ms",
        "  ".repeat(depth),
        span.name,
        span.duration().as_millis()
    );

    if !span.attributes.is_empty() {
        line.push_str(" [");
        line.push_str(&format_attributes(&span.attributes));
        line.push(']');
    }

    line
}

fn format_attributes(attributes: &[KeyValue]) -> String {
    attributes
        .iter()
        .map(|kv| format!("{}={}", kv.key.as_str(), kv.value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the spans of one trace depth-first from the root
///
/// Spans whose parent is not part of the trace are appended one level under
/// the root.
pub fn render_tree(root: SpanId, spans: &[SpanRecord]) -> Vec<String> {
    let mut children: HashMap<SpanId, Vec<&SpanRecord>> = HashMap::new();
    for span in spans {
        if let Some(parent) = span.parent_span_id {
            children.entry(parent).or_default().push(span);
        }
    }
    for list in children.values_mut() {
        list.sort_by_key(|s| s.start_time);
    }

    let mut lines = Vec::with_capacity(spans.len());
    let mut visited = HashSet::new();
    let mut stack: Vec<(&SpanRecord, usize)> = spans
        .iter()
        .filter(|s| s.span_id == root)
        .map(|s| (s, 0))
        .collect();

    while let Some((span, depth)) = stack.pop() {
        if !visited.insert(span.span_id) {
            continue;
        }
        lines.push(span_line(span, depth));

        if let Some(kids) = children.get(&span.span_id) {
            stack.extend(kids.iter().rev().map(|kid| (*kid, depth + 1)));
        }
    }

    for span in spans {
        if !visited.contains(&span.span_id) {
            lines.push(span_line(span, 1));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use opentelemetry::trace::{SpanKind, Status};

    fn span(trace: u128, id: u64, parent: Option<u64>, name: &str, start_ms: i64, ms: i64) -> SpanRecord {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let start_time = base + Duration::milliseconds(start_ms);
        SpanRecord {
            trace_id: TraceId::from_bytes(trace.to_be_bytes()),
            span_id: SpanId::from_bytes(id.to_be_bytes()),
            parent_span_id: parent.map(|p| SpanId::from_bytes(p.to_be_bytes())),
            name: name.to_string(),
            kind: SpanKind::Internal,
            start_time,
            end_time: start_time + Duration::milliseconds(ms),
            attributes: vec![],
            status: Status::Unset,
        }
    }

    #[test]
    fn test_span_line() {
        let mut s = span(1, 1, None, "handle", 0, 42);
        assert_eq!(span_line(&s, 0), "handle 42ms");

        s.attributes = vec![KeyValue::new("route", "/users"), KeyValue::new("status", 200_i64)];
        assert_eq!(span_line(&s, 2), "    handle 42ms [route=/users status=200]");
    }

    #[test]
    fn test_tree_logged_when_root_ends() {
        let exporter = NiceLoggingSpanExporter::new();

        assert!(exporter.accept(&span(1, 3, Some(2), "query", 2, 5)).is_empty());
        assert!(exporter.accept(&span(1, 2, Some(1), "load", 1, 10)).is_empty());
        assert!(exporter.accept(&span(1, 4, Some(1), "render", 12, 3)).is_empty());
        assert_eq!(exporter.pending_traces(), 1);

        let lines = exporter.accept(&span(1, 1, None, "request", 0, 20));
        assert_eq!(
            lines,
            vec![
                "request 20ms",
                "  load 10ms",
                "    query 5ms",
                "  render 3ms",
            ]
        );
        assert_eq!(exporter.pending_traces(), 0);
    }

    #[test]
    fn test_orphan_within_trace_goes_under_root() {
        let spans = vec![
            span(1, 9, Some(7), "lost", 0, 1),
            span(1, 1, None, "root", 0, 2),
        ];
        assert_eq!(render_tree(SpanId::from_bytes(1u64.to_be_bytes()), &spans), vec!["root 2ms", "  lost 1ms"]);
    }

    #[test]
    fn test_child_ending_after_root_is_logged() {
        let exporter = NiceLoggingSpanExporter::new();

        assert_eq!(exporter.accept(&span(1, 1, None, "root", 0, 1)), vec!["root 1ms"]);
        assert_eq!(
            exporter.accept(&span(1, 2, Some(1), "background", 0, 4)),
            vec!["  background 4ms"]
        );
        assert_eq!(exporter.pending_traces(), 0);
    }

    #[test]
    fn test_finished_traces_are_bounded() {
        let exporter = NiceLoggingSpanExporter::with_max_pending(2);

        for trace in 1..=3 {
            exporter.accept(&span(trace, 1, None, "root", 0, 1));
        }

        // Trace 1 was forgotten, so its late child waits again
        assert!(exporter.accept(&span(1, 2, Some(1), "late", 0, 1)).is_empty());
        assert_eq!(exporter.accept(&span(3, 2, Some(1), "late", 0, 1)), vec!["  late 1ms"]);
    }

    #[test]
    fn test_drain_pending_logs_unfinished_traces() {
        let exporter = NiceLoggingSpanExporter::new();
        exporter.accept(&span(1, 2, Some(1), "a", 0, 1));
        exporter.accept(&span(2, 3, Some(9), "b", 0, 2));
        exporter.accept(&span(1, 4, Some(1), "c", 0, 3));

        assert_eq!(exporter.drain_pending(), vec!["a 1ms", "c 3ms", "b 2ms"]);
        assert_eq!(exporter.pending_traces(), 0);
        assert!(exporter.drain_pending().is_empty());
    }

    #[test]
    fn test_oldest_trace_flushed_flat() {
        let exporter = NiceLoggingSpanExporter::with_max_pending(2);

        assert!(exporter.accept(&span(1, 10, Some(1), "a", 0, 1)).is_empty());
        assert!(exporter.accept(&span(2, 20, Some(2), "b", 0, 1)).is_empty());
        let flushed = exporter.accept(&span(3, 30, Some(3), "c", 0, 1));

        assert_eq!(flushed, vec!["a 1ms"]);
        assert_eq!(exporter.pending_traces(), 2);
    }
}
