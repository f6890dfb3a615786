//! Request payload model and text extraction.
//!
//! Task requests carry arbitrary JSON-like data. The safety layer only cares
//! about the string leaves, so the payload is modelled as a closed recursive
//! sum type that can be walked with a [`PayloadVisitor`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// An arbitrary request payload.
///
/// Map entries keep their insertion order, which is also the order in which
/// they are visited.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Payload {
    /// JSON null.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(Number),
    /// String leaf.
    String(String),
    /// Ordered list of values.
    List(Vec<Payload>),
    /// Ordered map of key/value entries.
    Map(Vec<(String, Payload)>),
}

impl Payload {
    /// Creates an empty map payload.
    pub fn empty_map() -> Self {
        Payload::Map(Vec::new())
    }

    /// Returns true if this payload is a map.
    pub fn is_map(&self) -> bool {
        matches!(self, Payload::Map(_))
    }

    /// Returns the string value if this payload is a string leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a key in a map payload.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        match self {
            Payload::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Inserts or replaces a key in a map payload.
    ///
    /// Existing keys keep their position. Returns false if this payload is
    /// not a map.
    pub fn insert(&mut self, key: impl Into<String>, value: Payload) -> bool {
        let Payload::Map(entries) = self else {
            return false;
        };

        let key = key.into();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => entries.push((key, value)),
        }
        true
    }

    /// Walks the payload depth-first, calling the visitor for every node.
    ///
    /// Map entries are visited in insertion order and list items in order.
    /// The traversal uses an explicit stack, so arbitrarily deep payloads are
    /// safe to walk.
    pub fn walk<V: PayloadVisitor>(&self, visitor: &mut V) {
        enum Frame<'a> {
            Node(&'a Payload),
            Key(&'a str),
        }

        let mut stack = vec![Frame::Node(self)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Key(key) => visitor.visit_key(key),
                Frame::Node(node) => match node {
                    Payload::Null => visitor.visit_null(),
                    Payload::Bool(b) => visitor.visit_bool(*b),
                    Payload::Number(n) => visitor.visit_number(n),
                    Payload::String(s) => visitor.visit_string(s),
                    Payload::List(items) => {
                        for item in items.iter().rev() {
                            stack.push(Frame::Node(item));
                        }
                    }
                    Payload::Map(entries) => {
                        for (key, value) in entries.iter().rev() {
                            stack.push(Frame::Node(value));
                            stack.push(Frame::Key(key));
                        }
                    }
                },
            }
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => Payload::Number(n),
            Value::String(s) => Payload::String(s),
            Value::Array(items) => Payload::List(items.into_iter().map(Payload::from).collect()),
            Value::Object(map) => {
                Payload::Map(map.into_iter().map(|(k, v)| (k, Payload::from(v))).collect())
            }
        }
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Null => Value::Null,
            Payload::Bool(b) => Value::Bool(b),
            Payload::Number(n) => Value::Number(n),
            Payload::String(s) => Value::String(s),
            Payload::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Payload::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(k, Value::from(v));
                }
                Value::Object(map)
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::String(s)
    }
}

/// Typed visitor over the nodes of a [`Payload`].
///
/// All methods default to no-ops so visitors only implement what they need.
pub trait PayloadVisitor {
    /// Called for every map key, before its value is visited.
    fn visit_key(&mut self, _key: &str) {}

    /// Called for every string leaf.
    fn visit_string(&mut self, _value: &str) {}

    /// Called for every numeric leaf.
    fn visit_number(&mut self, _value: &Number) {}

    /// Called for every boolean leaf.
    fn visit_bool(&mut self, _value: bool) {}

    /// Called for every null leaf.
    fn visit_null(&mut self) {}
}

/// Collects the lowercased string leaves of a payload.
#[derive(Debug, Default)]
pub struct TextExtractor {
    parts: Vec<String>,
}

impl TextExtractor {
    /// Creates an empty extractor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the collected leaves into a single searchable corpus.
    pub fn into_corpus(self) -> String {
        self.parts.join(" ")
    }
}

impl PayloadVisitor for TextExtractor {
    fn visit_string(&mut self, value: &str) {
        self.parts.push(value.to_lowercase());
    }
}

/// Flattens every string leaf of `payload` into one lowercase corpus.
///
/// Non-string scalars are ignored rather than stringified.
pub fn extract_text(payload: &Payload) -> String {
    let mut extractor = TextExtractor::new();
    payload.walk(&mut extractor);
    extractor.into_corpus()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_strings_in_order() {
        let payload = Payload::from(json!({
            "title": "First",
            "responses": [
                {"questionId": "q1", "response": "Second"},
                "Third"
            ],
            "meta": {"note": "FOURTH"}
        }));

        assert_eq!(extract_text(&payload), "first q1 second third fourth");
    }

    #[test]
    fn ignores_non_string_scalars() {
        let payload = Payload::from(json!({
            "score": 17,
            "active": true,
            "missing": null,
            "label": "kept"
        }));

        assert_eq!(extract_text(&payload), "kept");
    }

    #[test]
    fn top_level_string_is_a_leaf() {
        let payload = Payload::from("Hello World");
        assert_eq!(extract_text(&payload), "hello world");
    }

    #[test]
    fn empty_payload_yields_empty_corpus() {
        assert_eq!(extract_text(&Payload::Null), "");
        assert_eq!(extract_text(&Payload::empty_map()), "");
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let mut payload = Payload::from("bottom");
        for _ in 0..100_000 {
            payload = Payload::List(vec![payload]);
        }
        assert_eq!(extract_text(&payload), "bottom");
        // Drop iteratively so the test itself does not overflow on teardown.
        let mut current = payload;
        while let Payload::List(mut items) = current {
            current = items.pop().unwrap_or_default();
        }
    }

    #[test]
    fn map_order_survives_json_round_trip() {
        let raw = r#"{"zeta": "z", "alpha": "a", "mid": "m"}"#;
        let payload: Payload = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(&payload), "z a m");

        let back = serde_json::to_string(&payload).unwrap();
        assert_eq!(back, r#"{"zeta":"z","alpha":"a","mid":"m"}"#);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut payload = Payload::from(json!({"a": "1", "b": "2"}));
        assert!(payload.insert("a", Payload::from("3")));
        assert!(payload.insert("c", Payload::from("4")));
        assert_eq!(extract_text(&payload), "3 2 4");

        let mut scalar = Payload::from("x");
        assert!(!scalar.insert("a", Payload::Null));
    }

    #[test]
    fn visitor_sees_keys_before_values() {
        #[derive(Default)]
        struct Recorder(Vec<String>);

        impl PayloadVisitor for Recorder {
            fn visit_key(&mut self, key: &str) {
                self.0.push(format!("key:{key}"));
            }
            fn visit_number(&mut self, value: &Number) {
                self.0.push(format!("num:{value}"));
            }
        }

        let payload = Payload::from(json!({"a": 1, "b": [2, 3]}));
        let mut recorder = Recorder::default();
        payload.walk(&mut recorder);

        assert_eq!(recorder.0, vec!["key:a", "num:1", "key:b", "num:2", "num:3"]);
    }
}
