//! Comparison semantics
//!
//! Values are compared as strings reinterpreted under the wider of the two
//! declared types. Parse failures are lenient (`false`); an operator that a
//! type does not support is an error.

use crate::error::{Error, Result};
use crate::graph::{Field, PropertyField, StringField};
use crate::types::{ComparisonOp, JsonDataType};
use std::cmp::Ordering;

/// Compare two raw values under `target` type
pub fn compare(v1: &str, v2: &str, target: JsonDataType, op: ComparisonOp) -> Result<bool> {
    match target {
        JsonDataType::Null => Ok(false),
        JsonDataType::Boolean => {
            let (a, b) = match (v1.parse::<bool>(), v2.parse::<bool>()) {
                (Ok(a), Ok(b)) => (a, b),
                _ => return equality_only(op, target).map(|_| false),
            };
            match op {
                ComparisonOp::Equal => Ok(a == b),
                ComparisonOp::NotEqual => Ok(a != b),
                _ => Err(unsupported(op, target)),
            }
        }
        JsonDataType::Int | JsonDataType::Long => {
            match (v1.trim().parse::<i64>(), v2.trim().parse::<i64>()) {
                (Ok(a), Ok(b)) => Ok(apply(a.cmp(&b), op)),
                _ => Ok(false),
            }
        }
        JsonDataType::Float | JsonDataType::Double => {
            match (v1.trim().parse::<f64>(), v2.trim().parse::<f64>()) {
                (Ok(a), Ok(b)) => Ok(a.partial_cmp(&b).map_or(false, |o| apply(o, op))),
                _ => Ok(false),
            }
        }
        JsonDataType::String => {
            let c = ordering_value(v1.cmp(v2));
            Ok(match op {
                ComparisonOp::Equal => c == 0,
                ComparisonOp::NotEqual => c != 0,
                ComparisonOp::GreaterThan => c > 0,
                // FIXME: same expression as GreaterThan; kept as observed until
                // an authoritative oracle settles the intended semantics.
                ComparisonOp::LessThan => c > 0,
                ComparisonOp::GreaterThanOrEqual => c >= 0,
                ComparisonOp::LessThanOrEqual => c <= 0,
            })
        }
        JsonDataType::Object | JsonDataType::Array => {
            equality_only(op, target)?;
            Ok(match op {
                ComparisonOp::Equal => v1 == v2,
                _ => v1 != v2,
            })
        }
    }
}

fn equality_only(op: ComparisonOp, target: JsonDataType) -> Result<()> {
    match op {
        ComparisonOp::Equal | ComparisonOp::NotEqual => Ok(()),
        _ => Err(unsupported(op, target)),
    }
}

fn unsupported(op: ComparisonOp, data_type: JsonDataType) -> Error {
    Error::UnsupportedComparison { op, data_type }
}

fn ordering_value(o: Ordering) -> i32 {
    match o {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

fn apply(o: Ordering, op: ComparisonOp) -> bool {
    match op {
        ComparisonOp::Equal => o == Ordering::Equal,
        ComparisonOp::NotEqual => o != Ordering::Equal,
        ComparisonOp::LessThan => o == Ordering::Less,
        ComparisonOp::LessThanOrEqual => o != Ordering::Greater,
        ComparisonOp::GreaterThan => o == Ordering::Greater,
        ComparisonOp::GreaterThanOrEqual => o != Ordering::Less,
    }
}

/// Scalar views of a field; multi-valued vertex properties yield one per value
pub fn scalar_values(field: &Field) -> Vec<StringField> {
    match field {
        Field::Value(s) => vec![s.clone()],
        Field::Property(p) => p.values().into_iter().cloned().collect(),
        Field::Compose1(c) => c.default_value().map(scalar_values).unwrap_or_default(),
        other => vec![StringField::new(other.to_value(), other.data_type())],
    }
}

/// Existential comparison: `true` if any pair of scalar values satisfies `op`.
///
/// A null operand never matches.
pub fn compare_fields(left: &Field, right: &Field, op: ComparisonOp) -> Result<bool> {
    let lhs = scalar_values(left);
    let rhs = scalar_values(right);
    for l in &lhs {
        for r in &rhs {
            if l.data_type == JsonDataType::Null || r.data_type == JsonDataType::Null {
                continue;
            }
            let target = l.data_type.wider(r.data_type);
            if compare(&l.value, &r.value, target, op)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Total order used by sorting: numeric when both sides are numeric,
/// lexicographic otherwise.
pub fn natural_order(a: &Field, b: &Field) -> Ordering {
    let (sa, sb) = (a.as_string_field(), b.as_string_field());
    if let (Some(x), Some(y)) = (sa.and_then(|s| s.as_f64()), sb.and_then(|s| s.as_f64())) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    match (a, b) {
        (Field::Property(p), Field::Property(q)) => {
            let (pv, qv) = (p.values(), q.values());
            match (pv.first().and_then(|s| s.as_f64()), qv.first().and_then(|s| s.as_f64())) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.to_value().cmp(&b.to_value()),
            }
        }
        _ => a.to_value().cmp(&b.to_value()),
    }
}
