use crate::{Comparison, Identity, Reconcilable};
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Receives the first difference found when two objects are not equal.
///
/// Passed explicitly to the comparison so the engine never reaches for a global logger.
pub trait DiffReporter: Send + Sync {
    fn report(&self, identity: &Identity, diff: &str);
}

/// Logs differences at debug level
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiffReporter;
impl DiffReporter for TracingDiffReporter {
    fn report(&self, identity: &Identity, diff: &str) {
        tracing::debug!("{identity} differs from the stored object: {diff}");
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDiffReporter;
impl DiffReporter for NoopDiffReporter {
    fn report(&self, _identity: &Identity, _diff: &str) {}
}

/// Keeps every reported difference, for tests
#[derive(Debug, Default)]
pub struct RecordingDiffReporter {
    diffs: Mutex<Vec<String>>,
}
impl RecordingDiffReporter {
    #[must_use]
    pub fn diffs(&self) -> Vec<String> {
        self.diffs.lock().map(|d| d.clone()).unwrap_or_default()
    }
}
impl DiffReporter for RecordingDiffReporter {
    fn report(&self, identity: &Identity, diff: &str) {
        if let Ok(mut diffs) = self.diffs.lock() {
            diffs.push(format!("{identity}: {diff}"));
        }
    }
}

/// Whether `desired` and `existing` are the same object for the purpose of convergence.
///
/// Anything that cannot be proven equal is reported as different, so a real change is
/// never skipped. The first differing field is handed to `reporter`.
pub fn objects_equal<K: Reconcilable>(
    desired: &K,
    existing: &K,
    identity: &Identity,
    reporter: &dyn DiffReporter,
) -> bool {
    let (left, right) = match (serde_json::to_value(desired), serde_json::to_value(existing)) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => {
            reporter.report(identity, &format!("cannot be serialized for comparison: {e}"));
            return false;
        }
    };
    let comparison = K::comparison();
    let left = normalize(left, comparison);
    let right = normalize(right, comparison);
    let equal = normalized_equal(&left, &right, comparison);
    if !equal {
        let diff = first_difference(&left, &right, "").unwrap_or_else(|| "representation differs".to_string());
        reporter.report(identity, &diff);
    }
    equal
}

/// Compare two already serialized payloads with the given strategy
#[must_use]
pub fn values_equal(a: &Value, b: &Value, comparison: Comparison) -> bool {
    normalized_equal(
        &normalize(a.clone(), comparison),
        &normalize(b.clone(), comparison),
        comparison,
    )
}

fn normalized_equal(left: &Value, right: &Value, comparison: Comparison) -> bool {
    match comparison {
        Comparison::Semantic => left == right,
        Comparison::Canonical => match (serde_json::to_vec(left), serde_json::to_vec(right)) {
            (Ok(l), Ok(r)) => l == r,
            _ => false,
        },
    }
}

fn normalize(value: Value, comparison: Comparison) -> Value {
    match comparison {
        Comparison::Semantic => prune(value).unwrap_or(Value::Null),
        Comparison::Canonical => canonicalize(value),
    }
}

// ── Semantic ──────────────────────────────────────────────────────────────────

/// Drops `null` and empty collections from objects, and empty strings from object
/// members. List items are kept in place so `[{}]` and `[]` stay different.
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune_member(v).map(|v| (k, v)))
                .collect();
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                None
            } else {
                Some(Value::Array(
                    items.into_iter().map(|v| prune(v).unwrap_or(Value::Null)).collect(),
                ))
            }
        }
        other => Some(other),
    }
}

/// An empty string member is what the API server stores as an unset optional string
fn prune_member(value: Value) -> Option<Value> {
    match value {
        Value::String(s) if s.is_empty() => None,
        other => prune(other),
    }
}

// ── Canonical ─────────────────────────────────────────────────────────────────

/// Rebuilds maps in sorted key order (independent of the map implementation serde_json
/// was built with) and folds floats holding an integral value into integers.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, canonicalize(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        Value::Number(n) => {
            if n.is_f64() {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
                    _ => Value::Number(n),
                }
            } else {
                Value::Number(n)
            }
        }
        other => other,
    }
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn show(v: Option<&Value>) -> String {
    v.map_or_else(|| "<unset>".to_string(), Value::to_string)
}

/// Path and values of the first field where `desired` and `existing` differ
#[must_use]
pub fn first_difference(desired: &Value, existing: &Value, path: &str) -> Option<String> {
    match (desired, existing) {
        (Value::Object(l), Value::Object(r)) => {
            let mut keys: Vec<&String> = l.keys().chain(r.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let p = join(path, key);
                match (l.get(key), r.get(key)) {
                    (Some(a), Some(b)) => {
                        if let Some(d) = first_difference(a, b, &p) {
                            return Some(d);
                        }
                    }
                    (a, b) => return Some(format!("{p}: {} != {}", show(a), show(b))),
                }
            }
            None
        }
        (Value::Array(l), Value::Array(r)) if l.len() == r.len() => l
            .iter()
            .zip(r.iter())
            .enumerate()
            .find_map(|(i, (a, b))| first_difference(a, b, &format!("{path}[{i}]"))),
        (Value::Array(l), Value::Array(r)) => Some(format!(
            "{}: {} items != {} items",
            if path.is_empty() { "." } else { path },
            l.len(),
            r.len()
        )),
        (a, b) if a == b => None,
        (a, b) => Some(format!("{}: {a} != {b}", if path.is_empty() { "." } else { path })),
    }
}
