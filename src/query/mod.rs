//! Physical operators
//!
//! Pull-based operator algebra evaluated against the session's graph view:
//! - sources and the operator protocol
//! - predicate and scalar evaluators
//! - traversal joins and adjacency decoding
//! - control flow over correlated sub-pipelines
//! - ordering, dedup and aggregation
//! - mutations that keep store, cache and edge symmetry in step

mod adjacency;
mod aggregate;
mod branch;
mod compare;
mod dedup;
mod fetch;
mod function;
mod map;
mod mutation;
mod operator;
mod order;
mod path;
mod properties;
mod repeat;
mod traversal;

// 协议与源
pub use operator::{
    drain, BoxedOperator, ContextSource, FilterOperator, Operator, ProjectColumnsOperator,
    RangeOperator,
};

// 求值
pub use compare::{compare, compare_fields, natural_order, scalar_values};
pub use function::{
    property_of, AndFunction, BooleanFunction, BoxedBoolean, BoxedScalar, ColumnValue,
    ComparisonFunction, Constant, ExistsFunction, InFunction, NotFunction, OrFunction,
    PropertyValue, ScalarFunction, ScalarSubquery,
};

// 遍历
pub use adjacency::{AdjacencyListDecoder, EDGE_META_FIELDS};
pub use fetch::FetchNodeOperator;
pub use traversal::{sink_reference, TraversalOperator};

// 控制流
pub use branch::{
    Branch, ChooseOperator, ChooseWithOptionsOperator, CoalesceOperator, UnionOperator,
};
pub use map::{FlatMapOperator, LocalOperator, MapOperator, OptionalOperator, SideEffectOperator};
pub use repeat::{RepeatMode, RepeatOperator};

// 排序、去重、聚合
pub use aggregate::{
    AggregateFunction, AggregateOperator, BoxedAggregate, Count, Extremum, Fold, Group,
    GroupOperator, Mean, ProjectAggregationOperator, ProjectOperator, StoreOperator, Sum,
};
pub use dedup::{DedupLocalOperator, DedupOperator};
pub use order::{OrderDirection, OrderKey, OrderLocalOperator, OrderOperator};
pub use path::{PathOperator, SelectOperator, StepColumn};
pub use properties::{expand_properties, PropertiesOperator};

// 变更
pub use mutation::{
    AddEOperator, AddVOperator, DropOperator, PropertyUpdate, UpdatePropertiesOperator,
};
