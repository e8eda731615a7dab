use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;

use super::RunEvent;
use crate::types::Usage;

/// Listener registered on a runner.
///
/// Both methods default to no-ops so observers implement only what they
/// need.
pub trait Observer: Send + Sync {
    fn on_event(&self, _event: &RunEvent) {}

    /// Open a span. Return `None` to skip span tracking.
    fn begin(&self, _name: &str, _metadata: &Value) -> Option<Box<dyn ObserverSpan>> {
        None
    }
}

pub trait ObserverSpan: Send {
    fn end(self: Box<Self>, output: &Value, usage: Option<&Usage>);
}

#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn emit(&self, event: &RunEvent) {
        for observer in &self.observers {
            if catch_unwind(AssertUnwindSafe(|| observer.on_event(event))).is_err() {
                tracing::warn!(event = event.name(), "Observer panicked while handling event");
            }
        }
    }

    pub fn begin(&self, name: &str, metadata: Value) -> SpanHandle {
        let spans = self
            .observers
            .iter()
            .filter_map(|observer| {
                catch_unwind(AssertUnwindSafe(|| observer.begin(name, &metadata)))
                    .unwrap_or_else(|_| {
                        tracing::warn!(span = name, "Observer panicked while opening span");
                        None
                    })
            })
            .collect();
        SpanHandle {
            name: name.to_string(),
            spans,
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Open span across every observer that chose to track it.
pub struct SpanHandle {
    name: String,
    spans: Vec<Box<dyn ObserverSpan>>,
}

impl SpanHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn end(self, output: Value, usage: Option<&Usage>) {
        for span in self.spans {
            if catch_unwind(AssertUnwindSafe(|| span.end(&output, usage))).is_err() {
                tracing::warn!(span = %self.name, "Observer panicked while closing span");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        closed: Arc<Mutex<Vec<(String, Value)>>>,
    }

    struct RecordedSpan {
        name: String,
        closed: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl ObserverSpan for RecordedSpan {
        fn end(self: Box<Self>, output: &Value, _usage: Option<&Usage>) {
            self.closed.lock().unwrap().push((self.name, output.clone()));
        }
    }

    impl Observer for Recorder {
        fn on_event(&self, event: &RunEvent) {
            self.events.lock().unwrap().push(event.name().to_string());
        }

        fn begin(&self, name: &str, _metadata: &Value) -> Option<Box<dyn ObserverSpan>> {
            Some(Box::new(RecordedSpan {
                name: name.to_string(),
                closed: self.closed.clone(),
            }))
        }
    }

    struct Panicky;

    impl Observer for Panicky {
        fn on_event(&self, _event: &RunEvent) {
            panic!("observer failure");
        }

        fn begin(&self, _name: &str, _metadata: &Value) -> Option<Box<dyn ObserverSpan>> {
            panic!("observer failure");
        }
    }

    #[test]
    fn test_panicking_observer_is_isolated() {
        let recorder = Arc::new(Recorder::default());
        let mut set = ObserverSet::new();
        set.register(Arc::new(Panicky));
        set.register(recorder.clone());

        set.emit(&RunEvent::LoopDetected {
            agent: "a".into(),
            turn: 1,
        });
        let span = set.begin("model.generate", serde_json::json!({"turn": 1}));
        span.end(serde_json::json!("done"), None);

        assert_eq!(*recorder.events.lock().unwrap(), vec!["loop_detected"]);
        let closed = recorder.closed.lock().unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].0, "model.generate");
    }

    #[test]
    fn test_empty_set_is_noop() {
        let set = ObserverSet::new();
        assert!(set.is_empty());
        set.begin("anything", Value::Null).end(Value::Null, None);
    }
}
