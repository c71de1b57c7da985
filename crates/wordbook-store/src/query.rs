//! Ordered range queries over one collection.
//!
//! Ordering follows the hosted store's child ordering: children missing the
//! field (or holding `null`) first, then `false`, `true`, numbers ascending,
//! strings in code-unit order, and finally objects/arrays. Ties, and
//! queries without `order_by`, fall back to key order, which for generated
//! keys is creation order.

use std::cmp::Ordering;

use serde_json::Value;

/// Upper sentinel for prefix ranges (last BMP private-use code point).
pub const PREFIX_END: char = '\u{f8ff}';

/// A query over the children of one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub collection: String,
    /// Child field to order and bound by. `None` orders by key.
    pub order_by: Option<String>,
    /// Inclusive lower bound on the ordered value.
    pub start_at: Option<Value>,
    /// Inclusive upper bound on the ordered value.
    pub end_at: Option<Value>,
}

impl Query {
    /// All children of `collection`, in key order.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            order_by: None,
            start_at: None,
            end_at: None,
        }
    }

    pub fn order_by_child(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn start_at(mut self, bound: impl Into<Value>) -> Self {
        self.start_at = Some(bound.into());
        self
    }

    pub fn end_at(mut self, bound: impl Into<Value>) -> Self {
        self.end_at = Some(bound.into());
        self
    }

    /// Restrict to ordered string values starting with `prefix`.
    pub fn prefix(self, prefix: &str) -> Self {
        let end = format!("{prefix}{PREFIX_END}");
        self.start_at(prefix).end_at(end)
    }

    /// The value this query orders `child` by.
    fn ordered_value<'a>(&self, key: &'a str, child: &'a Value) -> OrderedValue<'a> {
        match &self.order_by {
            Some(field) => OrderedValue::Field(child.get(field.as_str())),
            None => OrderedValue::Key(key),
        }
    }

    /// Whether a child falls inside this query's bounds.
    pub fn matches(&self, key: &str, child: &Value) -> bool {
        let ordered = self.ordered_value(key, child);
        if let Some(start) = &self.start_at
            && ordered.compare_bound(start) == Ordering::Less
        {
            return false;
        }
        if let Some(end) = &self.end_at
            && ordered.compare_bound(end) == Ordering::Greater
        {
            return false;
        }
        true
    }

    /// Sort children into query order.
    pub fn sort(&self, children: &mut [(String, Value)]) {
        children.sort_by(|(ka, va), (kb, vb)| {
            let a = self.ordered_value(ka, va);
            let b = self.ordered_value(kb, vb);
            a.cmp_to(&b).then_with(|| ka.cmp(kb))
        });
    }

    /// Filter and sort in one pass.
    pub fn apply<'a>(&self, children: impl Iterator<Item = (&'a String, &'a Value)>) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = children
            .filter(|(k, v)| self.matches(k, v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.sort(&mut out);
        out
    }
}

enum OrderedValue<'a> {
    Key(&'a str),
    Field(Option<&'a Value>),
}

impl OrderedValue<'_> {
    fn cmp_to(&self, other: &OrderedValue<'_>) -> Ordering {
        match (self, other) {
            (OrderedValue::Key(a), OrderedValue::Key(b)) => a.cmp(b),
            (OrderedValue::Field(a), OrderedValue::Field(b)) => compare_values(*a, *b),
            // Mixed kinds never occur within one query.
            _ => Ordering::Equal,
        }
    }

    fn compare_bound(&self, bound: &Value) -> Ordering {
        match self {
            OrderedValue::Key(key) => match bound {
                Value::String(b) => (*key).cmp(b.as_str()),
                other => compare_values(Some(&Value::String((*key).to_string())), Some(other)),
            },
            OrderedValue::Field(v) => compare_values(*v, Some(bound)),
        }
    }
}

fn rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Bool(true)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
    }
}

/// Total order over optional JSON values, as the store orders children.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_rank = rank(a).cmp(&rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

// ============================================================================
// Tests
// ============================================================================
