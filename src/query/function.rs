//! Predicate and scalar evaluators
//!
//! Evaluators read a record positionally. Subquery-backed evaluators drive a
//! nested operator tree through a [`ContextSource`]: push the record, reset,
//! pull.

use super::compare::compare_fields;
use super::operator::{BoxedOperator, ContextSource};
use crate::error::Result;
use crate::graph::{Field, PropertyField, RawRecord};
use crate::types::ComparisonOp;
use std::cell::RefCell;

pub trait BooleanFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<bool>;
}

pub trait ScalarFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<Option<Field>>;
}

pub type BoxedBoolean = Box<dyn BooleanFunction>;
pub type BoxedScalar = Box<dyn ScalarFunction>;

/// Field at a fixed column
#[derive(Debug, Clone)]
pub struct ColumnValue {
    column: usize,
}

impl ColumnValue {
    pub fn new(column: usize) -> Self {
        Self { column }
    }
}

impl ScalarFunction for ColumnValue {
    fn evaluate(&self, record: &RawRecord) -> Result<Option<Field>> {
        Ok(record.get(self.column).cloned())
    }
}

#[derive(Debug, Clone)]
pub struct Constant {
    value: Field,
}

impl Constant {
    pub fn new(value: Field) -> Self {
        Self { value }
    }
}

impl ScalarFunction for Constant {
    fn evaluate(&self, _record: &RawRecord) -> Result<Option<Field>> {
        Ok(Some(self.value.clone()))
    }
}

/// Named property of the vertex, edge or property in a column.
///
/// `id` and `label` resolve to the element's identity and label.
#[derive(Debug, Clone)]
pub struct PropertyValue {
    column: usize,
    name: String,
}

impl PropertyValue {
    pub fn new(column: usize, name: impl Into<String>) -> Self {
        Self {
            column,
            name: name.into(),
        }
    }
}

/// Resolve a property name against a field
pub fn property_of(field: &Field, name: &str) -> Option<Field> {
    match field {
        Field::Vertex(v) => {
            let v = v.borrow();
            match name {
                "id" => Some(Field::string(v.id())),
                "label" => Some(Field::string(v.label())),
                _ => v
                    .property(name)
                    .map(|p| Field::Property(PropertyField::Vertex(p.clone()))),
            }
        }
        Field::Edge(e) => match name {
            "id" => Some(Field::string(e.id())),
            "label" => Some(Field::string(e.label())),
            _ => e
                .property(name)
                .map(|p| Field::Property(PropertyField::Edge(p.clone()))),
        },
        Field::Property(PropertyField::VertexSingle(s)) => s
            .meta
            .get(name)
            .map(|m| Field::Property(PropertyField::Meta(m.clone()))),
        Field::Map(m) => m.get(&Field::string(name)).cloned(),
        Field::Compose1(c) => c.fields.get(name).cloned(),
        _ => None,
    }
}

impl ScalarFunction for PropertyValue {
    fn evaluate(&self, record: &RawRecord) -> Result<Option<Field>> {
        Ok(record
            .get(self.column)
            .and_then(|f| property_of(f, &self.name)))
    }
}

/// First result of a correlated sub-pipeline
pub struct ScalarSubquery {
    context: ContextSource,
    inner: RefCell<BoxedOperator>,
    /// Column of the sub-pipeline result to return; `None` means the last one
    column: Option<usize>,
}

impl ScalarSubquery {
    pub fn new(context: ContextSource, inner: BoxedOperator, column: Option<usize>) -> Self {
        Self {
            context,
            inner: RefCell::new(inner),
            column,
        }
    }
}

impl ScalarFunction for ScalarSubquery {
    fn evaluate(&self, record: &RawRecord) -> Result<Option<Field>> {
        self.context.set_context(record.clone());
        let mut inner = self.inner.borrow_mut();
        inner.reset_state();
        let Some(result) = inner.next()? else {
            return Ok(None);
        };
        let column = match self.column {
            Some(c) => c,
            None if result.is_empty() => return Ok(None),
            None => result.len() - 1,
        };
        Ok(result.get(column).cloned())
    }
}

pub struct ComparisonFunction {
    left: BoxedScalar,
    right: BoxedScalar,
    op: ComparisonOp,
}

impl ComparisonFunction {
    pub fn new(left: BoxedScalar, right: BoxedScalar, op: ComparisonOp) -> Self {
        Self { left, right, op }
    }
}

impl BooleanFunction for ComparisonFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<bool> {
        let (Some(l), Some(r)) = (self.left.evaluate(record)?, self.right.evaluate(record)?) else {
            return Ok(false);
        };
        compare_fields(&l, &r, self.op)
    }
}

pub struct AndFunction {
    children: Vec<BoxedBoolean>,
}

impl AndFunction {
    pub fn new(children: Vec<BoxedBoolean>) -> Self {
        Self { children }
    }
}

impl BooleanFunction for AndFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<bool> {
        for c in &self.children {
            if !c.evaluate(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub struct OrFunction {
    children: Vec<BoxedBoolean>,
}

impl OrFunction {
    pub fn new(children: Vec<BoxedBoolean>) -> Self {
        Self { children }
    }
}

impl BooleanFunction for OrFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<bool> {
        for c in &self.children {
            if c.evaluate(record)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct NotFunction {
    inner: BoxedBoolean,
}

impl NotFunction {
    pub fn new(inner: BoxedBoolean) -> Self {
        Self { inner }
    }
}

impl BooleanFunction for NotFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<bool> {
        Ok(!self.inner.evaluate(record)?)
    }
}

/// Membership of a value in a constant list
pub struct InFunction {
    value: BoxedScalar,
    candidates: Vec<Field>,
}

impl InFunction {
    pub fn new(value: BoxedScalar, candidates: Vec<Field>) -> Self {
        Self { value, candidates }
    }
}

impl BooleanFunction for InFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<bool> {
        let Some(v) = self.value.evaluate(record)? else {
            return Ok(false);
        };
        for c in &self.candidates {
            if compare_fields(&v, c, ComparisonOp::Equal)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Whether a correlated sub-pipeline yields at least one record
pub struct ExistsFunction {
    context: ContextSource,
    inner: RefCell<BoxedOperator>,
}

impl ExistsFunction {
    pub fn new(context: ContextSource, inner: BoxedOperator) -> Self {
        Self {
            context,
            inner: RefCell::new(inner),
        }
    }
}

impl BooleanFunction for ExistsFunction {
    fn evaluate(&self, record: &RawRecord) -> Result<bool> {
        self.context.set_context(record.clone());
        let mut inner = self.inner.borrow_mut();
        inner.reset_state();
        Ok(inner.next()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeField, StringField, VertexField, VertexSinglePropertyField};
    use crate::query::FilterOperator;

    fn vertex_record() -> RawRecord {
        let mut v = VertexField::new("v1", "person");
        let mut name = VertexSinglePropertyField::new(
            "p1",
            "name",
            StringField::string("marko"),
            "v1",
        );
        name.set_meta("since", StringField::long(2010));
        v.add_property_value(name);
        RawRecord::single(Field::Vertex(v.into_ref()))
    }

    #[test]
    fn test_property_value_resolves_vertex_and_meta() {
        let r = vertex_record();
        let name = PropertyValue::new(0, "name").evaluate(&r).unwrap().unwrap();
        assert_eq!(name.to_value(), "marko");
        assert_eq!(
            PropertyValue::new(0, "label").evaluate(&r).unwrap().unwrap().to_value(),
            "person"
        );
        assert!(PropertyValue::new(0, "age").evaluate(&r).unwrap().is_none());

        let single = match r.get(0).unwrap() {
            Field::Vertex(v) => v.borrow().property("name").unwrap().first().unwrap().clone(),
            _ => unreachable!(),
        };
        let meta = property_of(
            &Field::Property(PropertyField::VertexSingle(single)),
            "since",
        )
        .unwrap();
        assert_eq!(meta.to_value(), "2010");
    }

    #[test]
    fn test_edge_property() {
        let mut e = EdgeField::new("e1", "knows", "a", "b");
        e.set_property("weight", StringField::double(0.5));
        let r = RawRecord::single(Field::Edge(e));
        let pred = ComparisonFunction::new(
            Box::new(PropertyValue::new(0, "weight")),
            Box::new(Constant::new(Field::double(0.4))),
            ComparisonOp::GreaterThan,
        );
        assert!(pred.evaluate(&r).unwrap());
    }

    #[test]
    fn test_boolean_combinators() {
        let r = RawRecord::single(Field::long(5));
        let gt = |n: i64| -> BoxedBoolean {
            Box::new(ComparisonFunction::new(
                Box::new(ColumnValue::new(0)),
                Box::new(Constant::new(Field::long(n))),
                ComparisonOp::GreaterThan,
            ))
        };
        assert!(AndFunction::new(vec![gt(1), gt(4)]).evaluate(&r).unwrap());
        assert!(!AndFunction::new(vec![gt(1), gt(9)]).evaluate(&r).unwrap());
        assert!(OrFunction::new(vec![gt(9), gt(4)]).evaluate(&r).unwrap());
        assert!(NotFunction::new(gt(9)).evaluate(&r).unwrap());

        let within = InFunction::new(
            Box::new(ColumnValue::new(0)),
            vec![Field::long(3), Field::long(5)],
        );
        assert!(within.evaluate(&r).unwrap());
        assert!(!ComparisonFunction::new(
            Box::new(ColumnValue::new(3)),
            Box::new(Constant::new(Field::long(1))),
            ComparisonOp::Equal
        )
        .evaluate(&r)
        .unwrap());
    }

    #[test]
    fn test_exists_and_scalar_subquery() {
        // sub-pipeline: keep the context record only if column 0 > 2
        let ctx = ContextSource::new();
        let inner = FilterOperator::new(
            ctx.boxed(),
            Box::new(ComparisonFunction::new(
                Box::new(ColumnValue::new(0)),
                Box::new(Constant::new(Field::long(2))),
                ComparisonOp::GreaterThan,
            )),
        );
        let exists = ExistsFunction::new(ctx.clone(), Box::new(inner));
        assert!(exists.evaluate(&RawRecord::single(Field::long(3))).unwrap());
        assert!(!exists.evaluate(&RawRecord::single(Field::long(1))).unwrap());
        assert!(exists.evaluate(&RawRecord::single(Field::long(7))).unwrap());

        let ctx = ContextSource::new();
        let scalar = ScalarSubquery::new(ctx.clone(), ctx.boxed(), None);
        let mut r = RawRecord::single(Field::string("a"));
        r.append_field(Field::string("b"));
        assert_eq!(scalar.evaluate(&r).unwrap().unwrap().to_value(), "b");
    }
}
