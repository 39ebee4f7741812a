// Copyright 2022 Singularity Data
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The input data model of the compiler: a logical plan is an acyclic DAG of
//! `PlanNode`s shared through `PlanRef` (`Rc`). Nodes are immutable once
//! built; a frontend constructs them bottom-up and shared subexpressions are
//! represented by cloning the `Rc`, never the node.
//!
//! `children()` exposes a node's operands in *visit order*: upstream
//! relations come last so that a stack-based traversal popping from the back
//! reaches every data dependency before the nodes referring to it.

use std::fmt;
use std::rc::Rc;

use enum_as_inner::EnumAsInner;
use renoirc_common::catalog::Schema;
use renoirc_common::types::{DataType, ScalarImpl};

mod explain;
pub use explain::*;
mod walk;
pub use walk::*;

pub type PlanRef = Rc<PlanNode>;

/// All node kinds a logical plan is made of. The set is closed: the
/// classifier matches on these shapes and nothing else.
#[derive(Debug, EnumAsInner)]
pub enum PlanNode {
    TableScan(TableScan),
    ColumnRef(ColumnRef),
    Literal(Literal),
    Comparison(Comparison),
    BinaryArith(BinaryArith),
    Alias(Alias),
    Reduction(Reduction),
    Aggregation(Aggregation),
    Selection(Selection),
    Join(Join),
    WindowAggregate(WindowAggregate),
}

/// A scan of a named source table with its declared schema. Column types and
/// nullability come from here, never from the CSV file.
#[derive(Debug)]
pub struct TableScan {
    pub table_name: String,
    pub schema: Schema,
}

/// A reference to a column of the relation flowing at this point.
#[derive(Debug)]
pub struct ColumnRef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

#[derive(Debug)]
pub struct Literal {
    pub data: ScalarImpl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonKind {
    Equals,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl ComparisonKind {
    /// The operator token the emitted predicate uses.
    pub fn dataflow_op(&self) -> &'static str {
        match self {
            ComparisonKind::Equals => "==",
            ComparisonKind::Greater => ">",
            ComparisonKind::GreaterEqual => ">=",
            ComparisonKind::Less => "<",
            ComparisonKind::LessEqual => "<=",
        }
    }
}

#[derive(Debug)]
pub struct Comparison {
    pub kind: ComparisonKind,
    pub left: PlanRef,
    pub right: PlanRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithKind {
    Add,
    Subtract,
    Multiply,
}

impl ArithKind {
    pub fn dataflow_op(&self) -> &'static str {
        match self {
            ArithKind::Add => "+",
            ArithKind::Subtract => "-",
            ArithKind::Multiply => "*",
        }
    }
}

#[derive(Debug)]
pub struct BinaryArith {
    pub kind: ArithKind,
    pub left: PlanRef,
    pub right: PlanRef,
}

/// A named expression. Wraps arithmetic (a column mutation), a reduction
/// (inside an aggregation) or a window aggregate.
#[derive(Debug)]
pub struct Alias {
    pub name: String,
    pub data_type: DataType,
    pub child: PlanRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceKind {
    Sum,
    Max,
    Min,
    First,
}

/// An aggregate function call over a single column.
#[derive(Debug)]
pub struct Reduction {
    pub kind: ReduceKind,
    pub arg: PlanRef,
}

/// An aggregation relation: `aggs` are `Alias`-of-`Reduction` outputs, `by`
/// the group-key columns (empty for a whole-stream reduction). `schema` is
/// the declared output schema, group keys first, then aggregate outputs.
#[derive(Debug)]
pub struct Aggregation {
    pub input: PlanRef,
    pub aggs: Vec<PlanRef>,
    pub by: Vec<PlanRef>,
    pub schema: Schema,
}

/// A projection and/or filter relation. `columns` carries the projected
/// expressions (plain `ColumnRef`s for a projection, `Alias` expressions for
/// a mutation), `predicates` the filter comparisons.
#[derive(Debug)]
pub struct Selection {
    pub input: PlanRef,
    pub columns: Vec<PlanRef>,
    pub predicates: Vec<PlanRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
}

impl JoinKind {
    /// Name of the join method of the target streaming API.
    pub fn dataflow_call(&self) -> &'static str {
        match self {
            JoinKind::Inner => "join",
            JoinKind::LeftOuter => "left_join",
            JoinKind::FullOuter => "outer_join",
        }
    }
}

/// A join of two relations on a single column equality.
#[derive(Debug)]
pub struct Join {
    pub kind: JoinKind,
    pub left: PlanRef,
    pub right: PlanRef,
    pub predicates: Vec<PlanRef>,
}

/// A (group key, preceding, following) window declaration. Only
/// `following == 0` is expressible on the target engine.
#[derive(Clone, Debug)]
pub struct WindowSpec {
    pub group_by: String,
    pub preceding: u64,
    pub following: u64,
}

/// An aggregate evaluated over a sliding window instead of the whole group.
#[derive(Debug)]
pub struct WindowAggregate {
    pub func: PlanRef,
    pub spec: WindowSpec,
}

impl PlanNode {
    /// Children in visit order: dependencies of the node first, the upstream
    /// relation last. A post-order traversal popping from the back of this
    /// list therefore schedules every input branch before the node itself.
    pub fn children(&self) -> Vec<PlanRef> {
        match self {
            PlanNode::TableScan(_) | PlanNode::ColumnRef(_) | PlanNode::Literal(_) => vec![],
            PlanNode::Comparison(cmp) => vec![cmp.left.clone(), cmp.right.clone()],
            PlanNode::BinaryArith(arith) => vec![arith.left.clone(), arith.right.clone()],
            PlanNode::Alias(alias) => vec![alias.child.clone()],
            PlanNode::Reduction(red) => vec![red.arg.clone()],
            PlanNode::Aggregation(agg) => agg
                .aggs
                .iter()
                .chain(agg.by.iter())
                .cloned()
                .chain(std::iter::once(agg.input.clone()))
                .collect(),
            PlanNode::Selection(sel) => sel
                .predicates
                .iter()
                .chain(sel.columns.iter())
                .cloned()
                .chain(std::iter::once(sel.input.clone()))
                .collect(),
            PlanNode::Join(join) => join
                .predicates
                .iter()
                .cloned()
                .chain([join.left.clone(), join.right.clone()])
                .collect(),
            PlanNode::WindowAggregate(win) => vec![win.func.clone()],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PlanNode::TableScan(_) => "TableScan",
            PlanNode::ColumnRef(_) => "ColumnRef",
            PlanNode::Literal(_) => "Literal",
            PlanNode::Comparison(_) => "Comparison",
            PlanNode::BinaryArith(_) => "BinaryArith",
            PlanNode::Alias(_) => "Alias",
            PlanNode::Reduction(_) => "Reduction",
            PlanNode::Aggregation(_) => "Aggregation",
            PlanNode::Selection(_) => "Selection",
            PlanNode::Join(_) => "Join",
            PlanNode::WindowAggregate(_) => "WindowAggregate",
        }
    }
}

// Construction helpers. These build single nodes, not queries: the query
// frontend that assembles whole plans lives outside this crate.
impl PlanNode {
    pub fn table_scan(table_name: impl Into<String>, schema: Schema) -> PlanRef {
        Rc::new(PlanNode::TableScan(TableScan {
            table_name: table_name.into(),
            schema,
        }))
    }

    pub fn column(name: impl Into<String>, data_type: DataType, nullable: bool) -> PlanRef {
        Rc::new(PlanNode::ColumnRef(ColumnRef {
            name: name.into(),
            data_type,
            nullable,
        }))
    }

    pub fn literal(data: impl Into<ScalarImpl>) -> PlanRef {
        Rc::new(PlanNode::Literal(Literal { data: data.into() }))
    }

    pub fn comparison(kind: ComparisonKind, left: PlanRef, right: PlanRef) -> PlanRef {
        Rc::new(PlanNode::Comparison(Comparison { kind, left, right }))
    }

    pub fn binary_arith(kind: ArithKind, left: PlanRef, right: PlanRef) -> PlanRef {
        Rc::new(PlanNode::BinaryArith(BinaryArith { kind, left, right }))
    }

    pub fn alias(name: impl Into<String>, data_type: DataType, child: PlanRef) -> PlanRef {
        Rc::new(PlanNode::Alias(Alias {
            name: name.into(),
            data_type,
            child,
        }))
    }

    pub fn reduction(kind: ReduceKind, arg: PlanRef) -> PlanRef {
        Rc::new(PlanNode::Reduction(Reduction { kind, arg }))
    }

    pub fn aggregation(
        input: PlanRef,
        aggs: Vec<PlanRef>,
        by: Vec<PlanRef>,
        schema: Schema,
    ) -> PlanRef {
        Rc::new(PlanNode::Aggregation(Aggregation {
            input,
            aggs,
            by,
            schema,
        }))
    }

    pub fn selection(input: PlanRef, columns: Vec<PlanRef>, predicates: Vec<PlanRef>) -> PlanRef {
        Rc::new(PlanNode::Selection(Selection {
            input,
            columns,
            predicates,
        }))
    }

    pub fn join(kind: JoinKind, left: PlanRef, right: PlanRef, predicates: Vec<PlanRef>) -> PlanRef {
        Rc::new(PlanNode::Join(Join {
            kind,
            left,
            right,
            predicates,
        }))
    }

    pub fn window_aggregate(func: PlanRef, spec: WindowSpec) -> PlanRef {
        Rc::new(PlanNode::WindowAggregate(WindowAggregate { func, spec }))
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanNode::TableScan(scan) => {
                write!(
                    f,
                    "TableScan {{ table: {}, columns: {:?} }}",
                    scan.table_name,
                    scan.schema.names()
                )
            }
            PlanNode::ColumnRef(col) => write!(f, "Column({})", col.name),
            PlanNode::Literal(lit) => write!(f, "Literal({:?})", lit.data),
            PlanNode::Comparison(cmp) => write!(f, "Comparison({:?})", cmp.kind),
            PlanNode::BinaryArith(arith) => write!(f, "Arith({:?})", arith.kind),
            PlanNode::Alias(alias) => write!(f, "Alias({})", alias.name),
            PlanNode::Reduction(red) => write!(f, "Reduction({:?})", red.kind),
            PlanNode::Aggregation(agg) => {
                write!(f, "Aggregation {{ groups: {} }}", agg.by.len())
            }
            PlanNode::Selection(sel) => write!(
                f,
                "Selection {{ columns: {}, predicates: {} }}",
                sel.columns.len(),
                sel.predicates.len()
            ),
            PlanNode::Join(join) => write!(f, "Join {{ type: {:?} }}", join.kind),
            PlanNode::WindowAggregate(win) => write!(
                f,
                "WindowAggregate {{ group_by: {}, preceding: {} }}",
                win.spec.group_by, win.spec.preceding
            ),
        }
    }
}
