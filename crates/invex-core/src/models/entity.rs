//! Entity spans, entity maps and user-supplied annotations.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Provenance of a detected span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanSource {
    /// Produced by the learned recognizer.
    Learned,
    /// Produced by a fallback pattern rule.
    Rule,
    /// Supplied by a user correction.
    User,
}

/// A detected value attributed to an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    /// Matched text.
    pub value: String,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Which detector produced the span.
    pub source: SpanSource,
}

impl EntitySpan {
    pub fn new(value: impl Into<String>, confidence: f32, source: SpanSource) -> Self {
        Self {
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    /// A user-supplied span, always fully confident.
    pub fn user(value: impl Into<String>) -> Self {
        Self::new(value, 1.0, SpanSource::User)
    }
}

/// A string-keyed map that remembers insertion order.
///
/// Serializes as a JSON object with keys in insertion order. Re-inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a value, returning the previous one if the key existed.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V: Default> OrderedMap<V> {
    /// Get the value for `key`, inserting a default one at the end if absent.
    pub fn entry_or_default(&mut self, key: impl Into<String>) -> &mut V {
        let key = key.into();
        let idx = match self.entries.iter().position(|(k, _)| *k == key) {
            Some(idx) => idx,
            None => {
                self.entries.push((key, V::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Lower-cased entity type name to the spans detected for it, in detection order.
pub type EntityMap = OrderedMap<Vec<EntitySpan>>;

impl EntityMap {
    /// Whether at least one span exists for `entity_type`.
    pub fn has_spans(&self, entity_type: &str) -> bool {
        self.get(entity_type).is_some_and(|spans| !spans.is_empty())
    }

    /// Span values for `entity_type`, empty if the type was not found.
    pub fn values(&self, entity_type: &str) -> Vec<String> {
        self.get(entity_type)
            .map(|spans| spans.iter().map(|s| s.value.clone()).collect())
            .unwrap_or_default()
    }
}

/// A `{ "value": ... }` record as found in corrections and test sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// A caller-supplied entity value.
///
/// Corrections and test sets arrive in several shapes: a list of span
/// records, a single record, a bare string, or nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotatedValue {
    Missing,
    Text(String),
    Record(ValueRecord),
    List(Vec<AnnotatedValue>),
}

impl AnnotatedValue {
    /// The value to label: the first element of a list, or the value itself.
    ///
    /// Returns `None` for empty or absent values.
    pub fn first_text(&self) -> Option<&str> {
        let text = match self {
            AnnotatedValue::Missing => return None,
            AnnotatedValue::Text(s) => s.as_str(),
            AnnotatedValue::Record(r) => r.value.as_str(),
            AnnotatedValue::List(items) => return items.first()?.first_text(),
        };
        (!text.is_empty()).then_some(text)
    }

    /// Every value as a plain string, flattening lists.
    pub fn texts(&self) -> Vec<String> {
        match self {
            AnnotatedValue::Missing => Vec::new(),
            AnnotatedValue::Text(s) => vec![s.clone()],
            AnnotatedValue::Record(r) => vec![r.value.clone()],
            AnnotatedValue::List(items) => items.iter().flat_map(|i| i.texts()).collect(),
        }
    }
}

impl From<&str> for AnnotatedValue {
    fn from(s: &str) -> Self {
        AnnotatedValue::Text(s.to_string())
    }
}

impl From<&[EntitySpan]> for AnnotatedValue {
    fn from(spans: &[EntitySpan]) -> Self {
        AnnotatedValue::List(
            spans
                .iter()
                .map(|s| {
                    AnnotatedValue::Record(ValueRecord {
                        value: s.value.clone(),
                        confidence: Some(s.confidence),
                    })
                })
                .collect(),
        )
    }
}

/// Entity type name to caller-supplied value.
pub type AnnotationMap = OrderedMap<AnnotatedValue>;

impl From<&EntityMap> for AnnotationMap {
    fn from(entities: &EntityMap) -> Self {
        entities
            .iter()
            .map(|(k, spans)| (k, AnnotatedValue::from(spans.as_slice())))
            .collect()
    }
}
