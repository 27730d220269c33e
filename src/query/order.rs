//! Ordering
//!
//! `OrderOperator` is a blocking point: nothing is emitted before the whole
//! upstream is drained. Rows are sorted once by a prioritized key list; the
//! first key that does not compare equal decides. The sort is stable.

use super::compare::natural_order;
use super::function::BoxedScalar;
use super::operator::{BoxedOperator, Operator};
use crate::error::{Error, Result};
use crate::graph::{CollectionField, Field, MapField, PathField, RawRecord};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Incr,
    Decr,
}

pub struct OrderKey {
    pub key: BoxedScalar,
    pub direction: OrderDirection,
}

impl OrderKey {
    pub fn new(key: BoxedScalar, direction: OrderDirection) -> Self {
        Self { key, direction }
    }

    pub fn incr(key: BoxedScalar) -> Self {
        Self::new(key, OrderDirection::Incr)
    }

    pub fn decr(key: BoxedScalar) -> Self {
        Self::new(key, OrderDirection::Decr)
    }
}

/// Evaluate every key on a record; a key without a value is an error
fn key_values(keys: &[OrderKey], record: &RawRecord) -> Result<Vec<Field>> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| {
            k.key
                .evaluate(record)?
                .ok_or_else(|| Error::UnresolvedValue(format!("排序键 #{} 在记录上没有值", i)))
        })
        .collect()
}

fn compare_keys(keys: &[OrderKey], a: &[Field], b: &[Field]) -> Ordering {
    for (k, (x, y)) in keys.iter().zip(a.iter().zip(b.iter())) {
        let o = natural_order(x, y);
        let o = match k.direction {
            OrderDirection::Incr => o,
            OrderDirection::Decr => o.reverse(),
        };
        if o != Ordering::Equal {
            return o;
        }
    }
    Ordering::Equal
}

/// Sort items by the keys evaluated on each item's record view
fn sort_by_keys<T>(keys: &[OrderKey], items: Vec<(RawRecord, T)>) -> Result<Vec<T>> {
    let mut keyed = Vec::with_capacity(items.len());
    for (view, item) in items {
        keyed.push((key_values(keys, &view)?, item));
    }
    keyed.sort_by(|a, b| compare_keys(keys, &a.0, &b.0));
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

pub struct OrderOperator {
    input: BoxedOperator,
    keys: Vec<OrderKey>,
    output: VecDeque<RawRecord>,
    sorted: bool,
    open: bool,
}

impl OrderOperator {
    pub fn new(input: BoxedOperator, keys: Vec<OrderKey>) -> Self {
        Self {
            input,
            keys,
            output: VecDeque::new(),
            sorted: false,
            open: true,
        }
    }

    fn sort(&mut self) -> Result<()> {
        let mut rows = Vec::new();
        while let Some(r) = self.input.next()? {
            rows.push((r.clone(), r));
        }
        debug!("order: sorting {} records", rows.len());
        self.output = sort_by_keys(&self.keys, rows)?.into();
        self.sorted = true;
        Ok(())
    }
}

impl Operator for OrderOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        if !self.sorted {
            self.sort()?;
        }
        match self.output.pop_front() {
            Some(r) => Ok(Some(r)),
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn state(&self) -> bool {
        self.open
    }

    fn reset_state(&mut self) {
        self.input.reset_state();
        self.output.clear();
        self.sorted = false;
        self.open = true;
    }
}

/// Sorts the elements of a collection, map or path held in one column.
///
/// Keys see each element as a record: `[element]`, or `[key, value]` for
/// map entries. Other field kinds pass through unchanged.
pub struct OrderLocalOperator {
    input: BoxedOperator,
    column: usize,
    keys: Vec<OrderKey>,
    open: bool,
}

impl OrderLocalOperator {
    pub fn new(input: BoxedOperator, column: usize, keys: Vec<OrderKey>) -> Self {
        Self {
            input,
            column,
            keys,
            open: true,
        }
    }

    fn sort_field(&self, field: &Field) -> Result<Field> {
        Ok(match field {
            Field::Collection(c) => {
                let items = c
                    .items
                    .iter()
                    .map(|f| (RawRecord::single(f.clone()), f.clone()))
                    .collect();
                Field::Collection(CollectionField::new(sort_by_keys(&self.keys, items)?))
            }
            Field::Map(m) => {
                let entries = m
                    .iter()
                    .map(|(k, v)| {
                        let view = RawRecord::from_fields(vec![Some(k.clone()), Some(v.clone())]);
                        (view, (k.clone(), v.clone()))
                    })
                    .collect();
                let mut sorted = MapField::new();
                for (k, v) in sort_by_keys(&self.keys, entries)? {
                    sorted.insert(k, v);
                }
                Field::Map(sorted)
            }
            Field::Path(p) => {
                let steps = p
                    .steps
                    .iter()
                    .map(|s| (RawRecord::from_fields(vec![s.value.clone()]), s.clone()))
                    .collect();
                Field::Path(PathField::new(sort_by_keys(&self.keys, steps)?))
            }
            other => other.clone(),
        })
    }
}

impl Operator for OrderLocalOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        let Some(mut record) = self.input.next()? else {
            self.close();
            return Ok(None);
        };
        if let Some(field) = record.get(self.column) {
            let sorted = self.sort_field(field)?;
            record.set(self.column, Some(sorted));
        }
        Ok(Some(record))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn state(&self) -> bool {
        self.open
    }

    fn reset_state(&mut self) {
        self.input.reset_state();
        self.open = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{drain, ColumnValue, ContextSource};
    use crate::testing::column;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn source(rows: Vec<Vec<Option<Field>>>) -> ContextSource {
        let src = ContextSource::new();
        src.set_bucket(rows.into_iter().map(RawRecord::from_fields).collect());
        src
    }

    fn col(i: usize) -> BoxedScalar {
        Box::new(ColumnValue::new(i))
    }

    #[test]
    fn test_key_precedence() {
        let src = source(vec![
            vec![Some(Field::string("b")), Some(Field::long(1))],
            vec![Some(Field::string("a")), Some(Field::long(1))],
            vec![Some(Field::string("b")), Some(Field::long(7))],
            vec![Some(Field::string("a")), Some(Field::long(3))],
        ]);
        let mut op = OrderOperator::new(
            src.boxed(),
            vec![OrderKey::incr(col(0)), OrderKey::decr(col(1))],
        );
        let out = drain(&mut op).unwrap();
        assert_eq!(column(&out, 0), vec!["a", "a", "b", "b"]);
        assert_eq!(column(&out, 1), vec!["3", "1", "7", "1"]);
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        let src = source(vec![
            vec![Some(Field::long(10))],
            vec![Some(Field::long(9))],
            vec![Some(Field::long(100))],
        ]);
        let mut op = OrderOperator::new(src.boxed(), vec![OrderKey::incr(col(0))]);
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["9", "10", "100"]);
    }

    #[test]
    fn test_missing_key_is_error() {
        let src = source(vec![vec![Some(Field::long(1))], vec![None]]);
        let mut op = OrderOperator::new(src.boxed(), vec![OrderKey::incr(col(0))]);
        assert!(matches!(op.next(), Err(Error::UnresolvedValue(_))));
    }

    #[test]
    fn test_randomized_rows_are_ordered_and_stable() {
        let mut rng = StdRng::seed_from_u64(42);
        let rows: Vec<Vec<Option<Field>>> = (0..300)
            .map(|seq| {
                vec![
                    Some(Field::long(rng.gen_range(0..5))),
                    Some(Field::long(rng.gen_range(0..20))),
                    Some(Field::long(seq)),
                ]
            })
            .collect();
        let mut op = OrderOperator::new(
            source(rows).boxed(),
            vec![OrderKey::incr(col(0)), OrderKey::decr(col(1))],
        );
        let out = drain(&mut op).unwrap();
        assert_eq!(out.len(), 300);

        let num = |r: &RawRecord, i: usize| r.get(i).unwrap().to_value().parse::<i64>().unwrap();
        for pair in out.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let (a0, b0) = (num(a, 0), num(b, 0));
            assert!(a0 <= b0);
            if a0 == b0 {
                assert!(num(a, 1) >= num(b, 1));
                if num(a, 1) == num(b, 1) {
                    // ties keep input order
                    assert!(num(a, 2) < num(b, 2));
                }
            }
        }
    }

    #[test]
    fn test_order_local_collection_and_map() {
        let list = Field::Collection(CollectionField::new(vec![
            Field::long(3),
            Field::long(1),
            Field::long(2),
        ]));
        let mut op = OrderLocalOperator::new(
            source(vec![vec![Some(list)]]).boxed(),
            0,
            vec![OrderKey::decr(col(0))],
        );
        let out = drain(&mut op).unwrap();
        assert_eq!(out[0].get(0).unwrap().to_value(), "[3, 2, 1]");

        let mut map = MapField::new();
        map.insert(Field::string("x"), Field::long(5));
        map.insert(Field::string("y"), Field::long(2));
        let src = source(vec![vec![Some(Field::string("row")), Some(Field::Map(map))]]);
        // entries are keyed on their value column
        let mut op = OrderLocalOperator::new(src.boxed(), 1, vec![OrderKey::incr(col(1))]);
        let out = drain(&mut op).unwrap();
        assert_eq!(out[0].get(1).unwrap().to_value(), "[y:2, x:5]");
        assert_eq!(out[0].get(0).unwrap().to_value(), "row");
    }
}
