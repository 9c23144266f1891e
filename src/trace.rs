//! Query trace lines: one JSON object per executed operation.
//!
//! Lines go to the `noteful::trace` log target and, when enabled, to a thread-local sink
//! so tests can assert on them without racing the global logger.

use std::cell::RefCell;

pub const TRACE_TARGET: &str = "noteful::trace";

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the thread-local sink on drop.
pub struct TraceSinkGuard;

impl Drop for TraceSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Start capturing trace lines emitted on the current thread.
#[must_use]
pub fn enable_thread_sink() -> TraceSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    TraceSinkGuard
}

pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Take the captured lines, leaving the sink enabled and empty.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

#[must_use]
pub fn snapshot() -> Vec<String> {
    TL_SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// Emit one trace line built from `key => value` pairs; values are JSON-encoded.
#[macro_export]
macro_rules! query_trace {
    ($($key:literal => $value:expr),+ $(,)?) => {{
        let mut __m = serde_json::Map::new();
        $( __m.insert($key.to_string(), serde_json::json!($value)); )+
        let __s = serde_json::Value::Object(__m).to_string();
        $crate::trace::write_str(&__s);
        log::trace!(target: $crate::trace::TRACE_TARGET, "{}", __s);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_local_sink_captures_lines() {
        let _g = enable_thread_sink();
        crate::query_trace!("op" => "find", "result_count" => 3);
        crate::query_trace!("op" => "count");
        let snap = snapshot();
        assert_eq!(snap.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&snap[0]).unwrap();
        assert_eq!(first["op"], "find");
        assert_eq!(first["result_count"], 3);
        assert_eq!(drain().len(), 2);
        assert!(snapshot().is_empty());
    }

    #[test]
    fn other_threads_are_not_captured() {
        let _g = enable_thread_sink();
        crate::query_trace!("op" => "main");
        let child = std::thread::spawn(|| {
            crate::query_trace!("op" => "child");
            snapshot()
        })
        .join()
        .unwrap();
        assert!(child.is_empty());
        assert_eq!(snapshot().len(), 1);
    }
}
