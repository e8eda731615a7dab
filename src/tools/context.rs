//! Context handed to tools, guardrails and enablement predicates.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{Message, last_user_message};

/// Caller-owned payload shared by reference across every tool and
/// guardrail of a run. Cloning yields another handle to the same map.
#[derive(Clone, Default)]
pub struct RunContext {
    inner: Arc<DashMap<String, Value>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a JSON object; non-object values are stored under `"value"`.
    pub fn from_value(value: Value) -> Self {
        let context = Self::new();
        match value {
            Value::Object(map) => {
                for (key, value) in map {
                    context.inner.insert(key, value);
                }
            }
            Value::Null => {}
            other => {
                context.inner.insert("value".to_string(), other);
            }
        }
        context
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|v| v.value().clone())
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.insert(key.into(), value)
    }

    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> serde_json::Result<()> {
        self.inner.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// True when both handles point at the same map.
    pub fn same_as(&self, other: &RunContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Point-in-time copy with keys in sorted order.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut entries: Vec<(String, Value)> = self
            .inner
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().collect()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.to_map()).finish()
    }
}

impl Serialize for RunContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RunContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_value(Value::Object(map)))
    }
}

/// Read-only view of the run passed to tools and guardrails.
///
/// Holds the shared [`RunContext`] plus a snapshot of the message history
/// taken when the turn's model response arrived.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub context: RunContext,
    pub agent_name: String,
    pub turn: u32,
    messages: Arc<Vec<Message>>,
    call_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(context: RunContext, agent_name: impl Into<String>, turn: u32) -> Self {
        Self {
            context,
            agent_name: agent_name.into(),
            turn,
            messages: Arc::new(Vec::new()),
            call_id: None,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    pub fn for_call(&self, call_id: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.call_id = Some(call_id.into());
        ctx
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        last_user_message(&self.messages)
    }

    /// Set only while a tool call is executing.
    pub fn call_id(&self) -> Option<&str> {
        self.call_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_state() {
        let a = RunContext::new();
        let b = a.clone();
        b.insert("user_id", json!(42));
        assert_eq!(a.get("user_id"), Some(json!(42)));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&RunContext::new()));
    }

    #[test]
    fn test_from_value() {
        let ctx = RunContext::from_value(json!({"tier": "gold", "seats": 3}));
        assert_eq!(ctx.get_as::<String>("tier").as_deref(), Some("gold"));
        assert_eq!(ctx.get_as::<u32>("seats"), Some(3));

        let scalar = RunContext::from_value(json!("raw"));
        assert_eq!(scalar.get("value"), Some(json!("raw")));
        assert!(RunContext::from_value(Value::Null).is_empty());
    }

    #[test]
    fn test_serde_is_sorted_map() {
        let ctx = RunContext::new();
        ctx.insert("b", json!(2));
        ctx.insert("a", json!(1));
        let text = serde_json::to_string(&ctx).unwrap();
        assert_eq!(text, r#"{"a":1,"b":2}"#);

        let back: RunContext = serde_json::from_str(&text).unwrap();
        assert_eq!(back.len(), 2);
        assert!(!back.same_as(&ctx));
    }

    #[test]
    fn test_execution_context_call_scope() {
        let ctx = ExecutionContext::new(RunContext::new(), "router", 2)
            .with_messages(vec![Message::user("hi"), Message::assistant("hello")]);
        assert!(ctx.call_id().is_none());

        let scoped = ctx.for_call("call_9");
        assert_eq!(scoped.call_id(), Some("call_9"));
        assert_eq!(scoped.last_user_message().map(|m| m.content.as_str()), Some("hi"));
        assert!(scoped.context.same_as(&ctx.context));
    }
}
