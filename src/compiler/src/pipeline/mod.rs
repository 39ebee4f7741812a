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

//! The operator IR: a closed set of dataflow operators, each knowing how to
//! render its fragment of the emitted program.
//!
//! The set is a tagged enum on purpose. Extending the IR means adding a
//! variant with explicit emission rules here and in `for_all_stream_ops`,
//! not deriving behavior from a base operator.

use paste::paste;
use renoirc_common::error::{CompileError, Result};
use renoirc_common::types::ScalarImpl;

use crate::plan::{PlanNode, PlanRef};
use crate::schema::SchemaRegistry;

mod filter;
pub use filter::FilterOp;
mod join;
pub use join::JoinOp;
mod map;
pub use map::MapOp;
mod project;
pub use project::ProjectOp;
mod reduce;
pub use reduce::{GroupReduceOp, LoneReduceOp};
mod source;
pub use source::SourceOp;
mod window;
pub use window::ExplicitWindowOp;

/// `for_all_stream_ops` names every operator variant once. A new operator is
/// added here and gets its `{Name}Op` struct with a `generate` emission rule.
#[macro_export]
macro_rules! for_all_stream_ops {
    ($macro:ident $(, $x:tt)*) => {
        $macro! {
            [$($x),*]
            ,{ Source }
            ,{ Filter }
            ,{ Map }
            ,{ LoneReduce }
            ,{ GroupReduce }
            ,{ Join }
            ,{ Project }
            ,{ ExplicitWindow }
        }
    };
}

macro_rules! impl_stream_op {
    ([], $( { $name:ident } ),*) => {
        paste! {
            /// One dataflow operator of the pipeline, in execution order.
            #[derive(Clone, Debug)]
            pub enum StreamOp {
                $( $name([<$name Op>]) ),*
            }

            impl StreamOp {
                /// Whether this operator registers a new row struct.
                pub fn does_add_struct(&self) -> bool {
                    match self {
                        $( StreamOp::$name(op) => op.does_add_struct() ),*
                    }
                }

                /// The plan node this operator was recognized from.
                pub fn plan_node(&self) -> &PlanRef {
                    match self {
                        $( StreamOp::$name(op) => op.plan_node() ),*
                    }
                }

                /// Render the dataflow fragment implementing this operator,
                /// registering any row struct it introduces.
                pub fn generate(
                    &self,
                    pos: usize,
                    pipeline: &Pipeline,
                    registry: &mut SchemaRegistry,
                ) -> Result<String> {
                    match self {
                        $( StreamOp::$name(op) => op.generate(pos, pipeline, registry) ),*
                    }
                }
            }

            $(
                impl From<[<$name Op>]> for StreamOp {
                    fn from(op: [<$name Op>]) -> Self {
                        StreamOp::$name(op)
                    }
                }
            )*
        }
    };
}
for_all_stream_ops! { impl_stream_op }

/// The ordered list of operators one compilation emits. Two consecutive
/// `Source` operators delimit one branch: the local transformations of one
/// input table.
#[derive(Default)]
pub struct Pipeline {
    ops: Vec<StreamOp>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: StreamOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[StreamOp] {
        &self.ops
    }

    /// Render all fragments in pipeline order. The registry is updated in
    /// lockstep, so afterwards it holds every struct the header must declare.
    pub fn generate(&self, registry: &mut SchemaRegistry) -> Result<String> {
        let mut body = String::new();
        for (pos, op) in self.ops.iter().enumerate() {
            let fragment = op.generate(pos, self, registry)?;
            log::debug!("operator {}: {}", pos, fragment.trim_start());
            body.push_str(&fragment);
        }
        Ok(body)
    }
}

/// Index of the most recent `Source` strictly before `pos`, i.e. the start
/// of the branch `pos` belongs to.
pub fn source_before(ops: &[StreamOp], pos: usize) -> Option<usize> {
    ops[..pos]
        .iter()
        .rposition(|op| matches!(op, StreamOp::Source(_)))
}

/// A stream is keyed at `pos` iff an operator between the start of its
/// branch and `pos` turned it into a (key, row) stream: a grouped reduction,
/// a join, or a windowed reduction (which groups on its own).
pub fn is_keyed_at(ops: &[StreamOp], pos: usize) -> bool {
    let start = source_before(ops, pos).unwrap_or(0);
    ops[start..pos].iter().any(|op| {
        matches!(
            op,
            StreamOp::GroupReduce(_) | StreamOp::Join(_) | StreamOp::ExplicitWindow(_)
        )
    })
}

/// Closure head for operators whose input may be keyed: on a keyed stream
/// the row is the second element of the (key, row) pair.
pub(crate) fn closure_head(keyed: bool) -> &'static str {
    if keyed {
        "|(_, x)|"
    } else {
        "|x|"
    }
}

/// Serialize a plan literal into the emitted program. String literals are
/// stripped to alphanumerics before quoting; numeric literals are emitted
/// verbatim.
pub(crate) fn render_literal(data: &ScalarImpl) -> String {
    match data {
        ScalarImpl::Utf8(s) => {
            let clean: String = s.chars().filter(|c| c.is_alphanumeric()).collect();
            format!("\"{}\"", clean)
        }
        ScalarImpl::Int64(v) => v.to_string(),
        ScalarImpl::Float64(v) => format!("{:?}", v),
        ScalarImpl::Bool(v) => v.to_string(),
    }
}

/// Recognize the dataflow operator a plan node maps to, if any.
///
/// The rule set is closed and the first match wins. Nodes matching no rule
/// have no dataflow counterpart of their own: they are consumed by a parent
/// (literals by filters, reductions by aggregations, predicates by joins).
pub fn classify(node: &PlanRef, pipeline: &Pipeline) -> Result<Option<StreamOp>> {
    let op = match node.as_ref() {
        PlanNode::TableScan(_) => Some(SourceOp::new(node.clone()).into()),
        PlanNode::Join(_) => Some(JoinOp::new(node.clone()).into()),
        PlanNode::Aggregation(agg) if agg.aggs.iter().any(|a| a.as_alias().is_some()) => {
            if agg.by.iter().any(|b| b.as_column_ref().is_some()) {
                Some(GroupReduceOp::new(node.clone()).into())
            } else {
                Some(LoneReduceOp::new(node.clone()).into())
            }
        }
        PlanNode::Comparison(cmp)
            if cmp.left.as_literal().is_some() || cmp.right.as_literal().is_some() =>
        {
            Some(FilterOp::new(node.clone()).into())
        }
        PlanNode::Alias(alias) if alias.child.as_window_aggregate().is_some() => {
            Some(ExplicitWindowOp::new(node.clone()).into())
        }
        PlanNode::Alias(alias) if alias.child.as_binary_arith().is_some() => {
            Some(MapOp::new(node.clone()).into())
        }
        PlanNode::Selection(sel) => {
            let columns: Vec<PlanRef> = sel
                .columns
                .iter()
                .filter(|c| c.as_column_ref().is_some())
                .cloned()
                .collect();
            let has_join_child = sel.input.as_join().is_some()
                || sel.columns.iter().any(|c| c.as_join().is_some());
            if columns.is_empty() || has_join_child {
                None
            } else {
                if matches!(pipeline.ops().last(), Some(StreamOp::Join(_))) {
                    return Err(CompileError::UnsupportedPlan(
                        "projection directly after a join".into(),
                    ));
                }
                Some(ProjectOp::new(node.clone(), columns).into())
            }
        }
        _ => None,
    };
    Ok(op)
}
