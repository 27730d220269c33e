//! Paths and labelled selection
//!
//! A record's step outputs sit at known columns; `PathOperator` turns those
//! columns into a [`PathField`] with each step's labels attached.
//! `SelectOperator` pulls labelled values back out of a path (or keys out
//! of a map) under a [`Pop`] policy.

use super::operator::{BoxedOperator, Operator};
use crate::error::{Error, Result};
use crate::graph::{CollectionField, Field, MapField, PathField, PathStep, RawRecord};
use crate::types::Pop;

/// Column of a step output plus the labels given to that step
#[derive(Debug, Clone)]
pub struct StepColumn {
    pub column: usize,
    pub labels: Vec<String>,
}

impl StepColumn {
    pub fn new(column: usize) -> Self {
        Self {
            column,
            labels: Vec::new(),
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

pub struct PathOperator {
    input: BoxedOperator,
    steps: Vec<StepColumn>,
    open: bool,
}

impl PathOperator {
    pub fn new(input: BoxedOperator, steps: Vec<StepColumn>) -> Self {
        Self {
            input,
            steps,
            open: true,
        }
    }

    fn build(&self, record: &RawRecord) -> PathField {
        let mut path = PathField::default();
        for step in &self.steps {
            // steps skipped by optional branches leave a null column
            let Some(value) = record.get(step.column) else {
                continue;
            };
            let mut s = PathStep::new(Some(value.clone()));
            for label in &step.labels {
                s = s.with_label(label.as_str());
            }
            path.push(s);
        }
        path
    }
}

impl Operator for PathOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        let Some(mut r) = self.input.next()? else {
            self.close();
            return Ok(None);
        };
        let path = self.build(&r);
        r.append_field(Field::Path(path));
        Ok(Some(r))
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

/// Value for one label under a pop policy
fn pop_labelled(field: &Field, label: &str, pop: Pop) -> Option<Field> {
    let matches: Vec<Field> = match field {
        Field::Path(p) => p.labelled(label).into_iter().cloned().collect(),
        Field::Map(m) => m.get(&Field::string(label)).cloned().into_iter().collect(),
        Field::Compose1(c) => c.fields.get(label).cloned().into_iter().collect(),
        _ => Vec::new(),
    };
    match pop {
        Pop::First => matches.into_iter().next(),
        Pop::Last => matches.into_iter().last(),
        Pop::All if matches.is_empty() => None,
        Pop::All => Some(Field::Collection(CollectionField::new(matches))),
    }
}

/// Appends the selected value, or a label → value map when several labels
/// are selected. An unmatched label is an error.
pub struct SelectOperator {
    input: BoxedOperator,
    column: usize,
    labels: Vec<String>,
    pop: Pop,
    open: bool,
}

impl SelectOperator {
    pub fn new(input: BoxedOperator, column: usize, labels: Vec<String>, pop: Pop) -> Self {
        Self {
            input,
            column,
            labels,
            pop,
            open: true,
        }
    }

    fn select(&self, record: &RawRecord) -> Result<Field> {
        let source = record
            .get(self.column)
            .ok_or_else(|| Error::UnresolvedValue(format!("select 列 {} 为空", self.column)))?;
        let mut selected = Vec::with_capacity(self.labels.len());
        for label in &self.labels {
            let value = pop_labelled(source, label, self.pop)
                .ok_or_else(|| Error::UnresolvedValue(format!("标签 {} 没有对应的值", label)))?;
            selected.push((label, value));
        }
        if selected.len() == 1 {
            if let Some((_, value)) = selected.pop() {
                return Ok(value);
            }
        }
        let mut map = MapField::new();
        for (label, value) in selected {
            map.insert(Field::string(label.as_str()), value);
        }
        Ok(Field::Map(map))
    }
}

impl Operator for SelectOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        let Some(mut r) = self.input.next()? else {
            self.close();
            return Ok(None);
        };
        let value = self.select(&r)?;
        r.append_field(value);
        Ok(Some(r))
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
    use crate::query::{drain, ContextSource};
    use crate::testing::last_column;

    fn three_steps() -> ContextSource {
        let src = ContextSource::new();
        src.set_bucket(vec![RawRecord::from_fields(vec![
            Some(Field::string("a")),
            None,
            Some(Field::string("b")),
            Some(Field::string("c")),
        ])]);
        src
    }

    fn path_op(src: &ContextSource) -> PathOperator {
        PathOperator::new(
            src.boxed(),
            vec![
                StepColumn::new(0).labelled("x"),
                StepColumn::new(1).labelled("x"),
                StepColumn::new(2).labelled("x").labelled("y"),
                StepColumn::new(3),
            ],
        )
    }

    #[test]
    fn test_path_skips_null_steps() {
        let src = three_steps();
        let mut op = path_op(&src);
        let out = drain(&mut op).unwrap();
        assert_eq!(last_column(&out), vec!["[a, b, c]"]);
    }

    #[test]
    fn test_select_pop_policies() {
        let select = |labels: &[&str], pop: Pop| {
            let labels = labels.iter().map(|l| l.to_string()).collect();
            let mut op = SelectOperator::new(Box::new(path_op(&three_steps())), 4, labels, pop);
            op.next()
        };
        assert_eq!(select(&["x"], Pop::First).unwrap().unwrap().get(5).unwrap().to_value(), "a");
        assert_eq!(select(&["x"], Pop::Last).unwrap().unwrap().get(5).unwrap().to_value(), "b");
        assert_eq!(select(&["x"], Pop::All).unwrap().unwrap().get(5).unwrap().to_value(), "[a, b]");
        assert_eq!(
            select(&["x", "y"], Pop::Last).unwrap().unwrap().get(5).unwrap().to_value(),
            "[x:b, y:b]"
        );
        assert!(matches!(select(&["z"], Pop::Last), Err(Error::UnresolvedValue(_))));
    }
}
