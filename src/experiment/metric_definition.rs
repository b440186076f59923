//! Metric Definition - what to measure, over which window, reduced how
//!
//! Metric configs arrive from the loader as a JSON mapping:
//!
//! ```json
//! {
//!   "conversion": {
//!     "metric_id": "checkout_conversion",
//!     "event": { "name": "purchase" },
//!     "window": { "start": "0 days", "end": "7 days" },
//!     "aggregation": "binary"
//!   }
//! }
//! ```
//!
//! [`MetricSet`] keeps the document order of that mapping; correction aligns
//! p-values by it.

use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::duration::{format_duration, parse_duration};
use crate::{Error, Result};

/// Placeholder metric ID for windows built outside a metric definition
const UNNAMED_METRIC: &str = "<unnamed>";

/// Reduction of a user's windowed events to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// 1 if the user has at least one windowed event, else 0
    Binary,
    /// Sum of `event_value` over windowed events
    Sum,
    /// Number of windowed events
    Count,
}

impl Aggregation {
    /// Config tag for this aggregation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Sum => "sum",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "sum" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            _ => Err(Error::UnsupportedAggregation(s.to_string())),
        }
    }
}

/// Window relative to exposure, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowSpec", into = "WindowSpec")]
pub struct MetricWindow {
    start: TimeDelta,
    end: TimeDelta,
}

impl MetricWindow {
    /// Create a window from offsets. `start` may be negative to capture
    /// pre-exposure baseline events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`] if `end < start` and
    /// [`Error::InvalidDuration`] if `end - start` is not representable.
    pub fn new(start: TimeDelta, end: TimeDelta) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidWindow {
                metric_id: UNNAMED_METRIC.to_string(),
                start: format_duration(start),
                end: format_duration(end),
            });
        }
        if end.checked_sub(&start).is_none() {
            return Err(Error::InvalidDuration(format!(
                "window from {} to {} is too long",
                format_duration(start),
                format_duration(end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a window from duration strings such as `"0 days"`, `"14 days"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDuration`] for malformed or overlong
    /// durations and [`Error::InvalidWindow`] if `end < start`.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_duration(start)?, parse_duration(end)?)
    }

    /// Offset of the window start from exposure.
    #[must_use]
    pub const fn start(&self) -> TimeDelta {
        self.start
    }

    /// Offset of the window end from exposure.
    #[must_use]
    pub const fn end(&self) -> TimeDelta {
        self.end
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        // span is checked on construction
        self.end.checked_sub(&self.start).unwrap_or(TimeDelta::MAX)
    }

    /// Whether a time-since-exposure falls inside the window.
    #[must_use]
    pub fn contains(&self, since_exposure: TimeDelta) -> bool {
        self.start <= since_exposure && since_exposure <= self.end
    }
}

/// Wire form of a metric window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Start offset, e.g. `"0 days"` or `"-1 hours"`
    pub start: String,
    /// End offset, e.g. `"14 days"`
    pub end: String,
}

impl TryFrom<WindowSpec> for MetricWindow {
    type Error = Error;

    fn try_from(spec: WindowSpec) -> Result<Self> {
        Self::parse(&spec.start, &spec.end)
    }
}

impl From<MetricWindow> for WindowSpec {
    fn from(window: MetricWindow) -> Self {
        Self {
            start: format_duration(window.start),
            end: format_duration(window.end),
        }
    }
}

/// Metric Definition: event name, window and aggregation under a visible ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MetricSpec", into = "MetricSpec")]
pub struct MetricDefinition {
    metric_id: String,
    event_name: String,
    window: MetricWindow,
    aggregation: Aggregation,
}

impl MetricDefinition {
    /// Create a new metric definition.
    #[must_use]
    pub fn new(
        metric_id: impl Into<String>,
        event_name: impl Into<String>,
        window: MetricWindow,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            metric_id: metric_id.into(),
            event_name: event_name.into(),
            window,
            aggregation,
        }
    }

    /// Get the externally visible metric ID.
    #[must_use]
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// Get the event name this metric counts.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Get the window relative to exposure.
    #[must_use]
    pub const fn window(&self) -> &MetricWindow {
        &self.window
    }

    /// Get the aggregation type.
    #[must_use]
    pub const fn aggregation(&self) -> Aggregation {
        self.aggregation
    }
}

/// Wire form of the event selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Event name to match
    pub name: String,
}

/// Wire form of a metric definition, as written by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Externally visible metric ID
    pub metric_id: String,
    /// Event selector (`{"name": ...}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventSpec>,
    /// Flat alternative to `event.name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Window offsets
    pub window: WindowSpec,
    /// Aggregation tag (`binary`, `sum`, `count`)
    pub aggregation: String,
}

impl TryFrom<MetricSpec> for MetricDefinition {
    type Error = Error;

    fn try_from(spec: MetricSpec) -> Result<Self> {
        let event_name = spec
            .event
            .map(|e| e.name)
            .or(spec.event_name)
            .ok_or_else(|| {
                Error::InvalidInput(format!("metric {} has no event name", spec.metric_id))
            })?;
        let aggregation = spec.aggregation.parse()?;
        let start = parse_duration(&spec.window.start)?;
        let end = parse_duration(&spec.window.end)?;
        let window = MetricWindow::new(start, end).map_err(|e| match e {
            Error::InvalidWindow { .. } => Error::InvalidWindow {
                metric_id: spec.metric_id.clone(),
                start: spec.window.start.clone(),
                end: spec.window.end.clone(),
            },
            other => other,
        })?;
        Ok(Self::new(spec.metric_id, event_name, window, aggregation))
    }
}

impl From<MetricDefinition> for MetricSpec {
    fn from(def: MetricDefinition) -> Self {
        Self {
            metric_id: def.metric_id,
            event: Some(EventSpec {
                name: def.event_name,
            }),
            event_name: None,
            window: def.window.into(),
            aggregation: def.aggregation.as_str().to_string(),
        }
    }
}

/// Ordered mapping from config key to metric definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSet {
    entries: Vec<(String, MetricDefinition)>,
}

impl MetricSet {
    /// Create an empty metric set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the loader's JSON mapping, keeping document order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and the typed input-shape
    /// errors ([`Error::UnsupportedAggregation`], [`Error::InvalidDuration`],
    /// [`Error::InvalidWindow`], [`Error::InvalidInput`]) for bad entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let specs: OrderedEntries<MetricSpec> = serde_json::from_str(json)?;
        let mut set = Self::new();
        for (key, spec) in specs.0 {
            set.insert(key, MetricDefinition::try_from(spec)?)?;
        }
        Ok(set)
    }

    /// Add a definition under `key`, replacing an existing entry in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if another key already uses the same
    /// `metric_id`.
    pub fn insert(&mut self, key: impl Into<String>, definition: MetricDefinition) -> Result<()> {
        let key = key.into();
        if let Some((other, _)) = self
            .entries
            .iter()
            .find(|(k, d)| *k != key && d.metric_id() == definition.metric_id())
        {
            return Err(Error::InvalidInput(format!(
                "duplicate metric_id {} (keys {other} and {key})",
                definition.metric_id()
            )));
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = definition,
            None => self.entries.push((key, definition)),
        }
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, definition: MetricDefinition) -> Result<Self> {
        self.insert(key, definition)?;
        Ok(self)
    }

    /// Get a definition by config key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetricDefinition> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    /// Number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no metrics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(key, definition)` in config order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricDefinition)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), d))
    }

    /// Definitions in config order.
    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.entries.iter().map(|(_, d)| d)
    }
}

impl Serialize for MetricSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, definition) in &self.entries {
            map.serialize_entry(key, definition)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetricSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let specs = OrderedEntries::<MetricSpec>::deserialize(deserializer)?;
        let mut set = Self::new();
        for (key, spec) in specs.0 {
            let definition = MetricDefinition::try_from(spec).map_err(serde::de::Error::custom)?;
            set.insert(key, definition).map_err(serde::de::Error::custom)?;
        }
        Ok(set)
    }
}

/// JSON object entries in document order.
struct OrderedEntries<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedEntries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor<V>(std::marker::PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = OrderedEntries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping from metric key to metric definition")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(std::marker::PhantomData))
    }
}
