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

//! Whole-pipeline tests: build a plan, compile it against scratch CSV
//! tables, and check the generated program. The external toolchain is never
//! invoked here.

use std::fs;
use std::path::PathBuf;

use renoirc_common::catalog::{Field, Schema};
use renoirc_common::config::CompilerConfig;
use renoirc_common::types::DataType;
use renoirc_compiler::plan::{
    ArithKind, ComparisonKind, JoinKind, PlanNode, PlanRef, ReduceKind, WindowSpec,
};
use renoirc_compiler::{compile_plan_to_dataflow, CompileOutcome};
use tempfile::TempDir;

fn config() -> CompilerConfig {
    CompilerConfig {
        run_after_gen: false,
        ..CompilerConfig::default()
    }
}

fn write_table(dir: &TempDir, name: &str, contents: &str) -> (PathBuf, String) {
    let path = dir.path().join(format!("{}.csv", name));
    fs::write(&path, contents).unwrap();
    (path, name.to_string())
}

fn t1_schema() -> Schema {
    Schema::new(vec![
        Field::with_name(DataType::Int64, "int1"),
        Field::with_name(DataType::Varchar, "string1"),
    ])
}

fn t2_schema() -> Schema {
    Schema::new(vec![
        Field::with_name(DataType::Int64, "int1"),
        Field::with_name(DataType::Int64, "int3"),
    ])
}

fn col(name: &str, data_type: DataType) -> PlanRef {
    PlanNode::column(name, data_type, true)
}

fn filter(input: PlanRef, predicate: PlanRef) -> PlanRef {
    PlanNode::selection(input, vec![], vec![predicate])
}

fn project(input: PlanRef, columns: Vec<PlanRef>) -> PlanRef {
    PlanNode::selection(input, columns, vec![])
}

fn mutate(input: PlanRef, alias: PlanRef) -> PlanRef {
    PlanNode::selection(input, vec![alias], vec![])
}

fn generated_source(outcome: CompileOutcome) -> String {
    match outcome {
        CompileOutcome::Generated { main_path } => fs::read_to_string(main_path).unwrap(),
        other => panic!("expected a generated program, got {:?}", other),
    }
}

#[test]
fn test_filter_then_project() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int1,string1\n1,a\n2,unduetre\n3,b\n");

    let scan = PlanNode::table_scan("t1", t1_schema());
    let filtered = filter(
        scan,
        PlanNode::comparison(
            ComparisonKind::Equals,
            col("string1", DataType::Varchar),
            PlanNode::literal("unduetre"),
        ),
    );
    let query = project(filtered, vec![col("int1", DataType::Int64)]);

    let outcome =
        compile_plan_to_dataflow(&query, vec![table], dir.path(), config()).unwrap();
    let source = generated_source(outcome);

    let expected = format!(
        "use renoir::prelude::*;\n\
         use serde::{{Deserialize, Serialize}};\n\
         use std::cmp::{{max, min}};\n\
         \n\
         #[derive(Clone, Debug, Default, Serialize, Deserialize, PartialOrd, PartialEq)]\n\
         struct Struct_var_0 {{\n    int1: Option<i64>,\n    string1: Option<String>,\n}}\n\
         \n\
         #[derive(Clone, Debug, Default, Serialize, Deserialize, PartialOrd, PartialEq)]\n\
         struct Struct_var_1 {{\n    int1: Option<i64>,\n}}\n\
         \n\
         fn logic(ctx: &StreamContext) {{\n\
         let t1 = ctx.stream_csv::<Struct_var_0>(\"{}\");\n\
         let var_1 = t1\
         .filter(|x| x.string1.clone().is_some_and(|v| v == \"unduetre\"))\
         .map(|x| Struct_var_1{{int1: x.int1}});\n\
         var_1.write_csv_one(\"{}\");\n\
         }}\n\
         \n\
         fn main() {{\n    let ctx = StreamContext::new_local();\n    logic(&ctx);\n    ctx.execute_blocking();\n}}\n",
        dir.path().join("t1.csv").display(),
        dir.path().join("out").join("result.csv").display(),
    );
    assert_eq!(source, expected);
}

#[test]
fn test_double_filter_double_project() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int1,string1\n123,unduetre\n123,x\n7,unduetre\n");

    let scan = PlanNode::table_scan("t1", t1_schema());
    let f1 = filter(
        scan,
        PlanNode::comparison(
            ComparisonKind::Equals,
            col("int1", DataType::Int64),
            PlanNode::literal(123i64),
        ),
    );
    let f2 = filter(
        f1,
        PlanNode::comparison(
            ComparisonKind::Equals,
            col("string1", DataType::Varchar),
            PlanNode::literal("unduetre"),
        ),
    );
    let p1 = project(
        f2,
        vec![col("int1", DataType::Int64), col("string1", DataType::Varchar)],
    );
    let query = project(p1, vec![col("string1", DataType::Varchar)]);

    let source = generated_source(
        compile_plan_to_dataflow(&query, vec![table], dir.path(), config()).unwrap(),
    );

    assert!(source.contains(".filter(|x| x.int1.clone().is_some_and(|v| v == 123))"));
    assert!(source.contains(".filter(|x| x.string1.clone().is_some_and(|v| v == \"unduetre\"))"));
    assert!(source.contains(".map(|x| Struct_var_1{int1: x.int1, string1: x.string1})"));
    assert!(source.contains(".map(|x| Struct_var_2{string1: x.string1})"));
    // filters add no struct, so the branch-final variable is the second map's
    assert!(source.contains("let var_2 = t1"));
    assert!(source.contains("var_2.write_csv_one("));
}

#[test]
fn test_group_and_sum() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int1,string1\n10,a\n20,a\n5,b\n");

    let scan = PlanNode::table_scan("t1", t1_schema());
    let query = PlanNode::aggregation(
        scan,
        vec![PlanNode::alias(
            "agg",
            DataType::Int64,
            PlanNode::reduction(ReduceKind::Sum, col("int1", DataType::Int64)),
        )],
        vec![col("string1", DataType::Varchar)],
        Schema::new(vec![
            Field::with_name(DataType::Varchar, "string1"),
            Field::with_name(DataType::Int64, "agg"),
        ]),
    );

    let source = generated_source(
        compile_plan_to_dataflow(&query, vec![table], dir.path(), config()).unwrap(),
    );

    assert!(source.contains(".group_by(|x| x.string1.clone())"));
    assert!(source.contains(
        ".reduce(|a, b| {a.int1 = match (a.int1.clone(), b.int1.clone()) \
         {(Some(v), Some(w)) => Some(v + w), (v, w) => v.or(w)};})"
    ));
    assert!(source.contains(".map(|(_, x)| Struct_var_1{agg: x.int1})"));
}

#[test]
fn test_map_then_grouped_reduce() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int1,string1\n1,a\n2,a\n3,b\n");

    let scan = PlanNode::table_scan("t1", t1_schema());
    let filtered = filter(
        scan,
        PlanNode::comparison(
            ComparisonKind::Greater,
            col("int1", DataType::Int64),
            PlanNode::literal(1i64),
        ),
    );
    let mutated = mutate(
        filtered,
        PlanNode::alias(
            "mul",
            DataType::Int64,
            PlanNode::binary_arith(
                ArithKind::Multiply,
                col("int1", DataType::Int64),
                PlanNode::literal(20i64),
            ),
        ),
    );
    let query = PlanNode::aggregation(
        mutated,
        vec![PlanNode::alias(
            "agg",
            DataType::Int64,
            PlanNode::reduction(ReduceKind::Sum, col("mul", DataType::Int64)),
        )],
        vec![col("string1", DataType::Varchar)],
        Schema::new(vec![
            Field::with_name(DataType::Varchar, "string1"),
            Field::with_name(DataType::Int64, "agg"),
        ]),
    );

    let source = generated_source(
        compile_plan_to_dataflow(&query, vec![table], dir.path(), config()).unwrap(),
    );

    assert!(source.contains(".filter(|x| x.int1.clone().is_some_and(|v| v > 1))"));
    // the mutated column is lifted because int1 is nullable
    assert!(source.contains(
        ".map(|x| Struct_var_1{int1: x.int1, string1: x.string1, mul: x.int1.map(|v| v * 20)})"
    ));
    let map_pos = source.find("mul: x.int1.map").unwrap();
    let group_pos = source.find(".group_by(|x| x.string1.clone())").unwrap();
    assert!(map_pos < group_pos, "the mutation must precede the grouping");
    assert!(source.contains(".map(|(_, x)| Struct_var_2{agg: x.mul})"));
}

#[test]
fn test_inner_join_with_projection() {
    let dir = tempfile::tempdir().unwrap();
    let t1 = write_table(&dir, "t1", "int1,string1\n1,x\n2,y\n");
    let t2 = write_table(&dir, "t2", "int1,int3\n1,10\n3,30\n");

    let left = mutate(
        filter(
            PlanNode::table_scan("t1", t1_schema()),
            PlanNode::comparison(
                ComparisonKind::Less,
                col("int1", DataType::Int64),
                PlanNode::literal(200i64),
            ),
        ),
        PlanNode::alias(
            "mul",
            DataType::Int64,
            PlanNode::binary_arith(
                ArithKind::Multiply,
                col("int1", DataType::Int64),
                PlanNode::literal(20i64),
            ),
        ),
    );
    let right = mutate(
        PlanNode::table_scan("t2", t2_schema()),
        PlanNode::alias(
            "sum",
            DataType::Int64,
            PlanNode::binary_arith(
                ArithKind::Add,
                col("int3", DataType::Int64),
                PlanNode::literal(100i64),
            ),
        ),
    );
    let joined = PlanNode::join(
        JoinKind::Inner,
        left,
        right,
        vec![PlanNode::comparison(
            ComparisonKind::Equals,
            col("int1", DataType::Int64),
            col("int1", DataType::Int64),
        )],
    );
    // a projection of the join output has no dataflow counterpart: the
    // emitted program keeps the full joined row
    let query = project(
        joined,
        vec![
            col("string1", DataType::Varchar),
            col("int1", DataType::Int64),
            col("int3", DataType::Int64),
        ],
    );

    let source = generated_source(
        compile_plan_to_dataflow(&query, vec![t1, t2], dir.path(), config()).unwrap(),
    );

    // the second branch is bound before the driving one
    assert!(source.contains("let var_1 = t2.map(|x| Struct_var_1"));
    assert!(source.contains("let var_4 = t1"));
    assert!(source.contains(".join(var_1, |x| x.int1.clone(), |y| y.int1.clone())"));
    assert!(source.contains(
        ".map(|(_, x)| Struct_var_4{int1: x.0.int1, string1: x.0.string1, mul: x.0.mul, \
         int1_right: x.1.int1, int3: x.1.int3, sum: x.1.sum})"
    ));
    assert!(source.contains("var_4.write_csv_one("));
}

#[test]
fn test_grouped_reduce_joined_with_ungrouped_stream() {
    let dir = tempfile::tempdir().unwrap();
    let t1 = write_table(&dir, "t1", "int1,string1,int4\n1,x,100\n2,y,300\n1,z,200\n");
    let t2 = write_table(&dir, "t2", "int1,int2\n1,5\n1,7\n2,3\n");

    let t1_schema = Schema::new(vec![
        Field::with_name(DataType::Int64, "int1"),
        Field::with_name(DataType::Varchar, "string1"),
        Field::with_name(DataType::Int64, "int4"),
    ]);
    let t2_schema = Schema::new(vec![
        Field::with_name(DataType::Int64, "int1"),
        Field::with_name(DataType::Int64, "int2"),
    ]);

    let reduced = PlanNode::aggregation(
        PlanNode::table_scan("t2", t2_schema),
        vec![PlanNode::alias(
            "agg2",
            DataType::Int64,
            PlanNode::reduction(ReduceKind::Sum, col("int2", DataType::Int64)),
        )],
        vec![col("int1", DataType::Int64)],
        Schema::new(vec![
            Field::with_name(DataType::Int64, "int1"),
            Field::with_name(DataType::Int64, "agg2"),
        ]),
    );
    let joined = PlanNode::join(
        JoinKind::Inner,
        reduced,
        PlanNode::table_scan("t1", t1_schema),
        vec![PlanNode::comparison(
            ComparisonKind::Equals,
            col("int1", DataType::Int64),
            col("int1", DataType::Int64),
        )],
    );
    let query = mutate(
        joined,
        PlanNode::alias(
            "mut4",
            DataType::Int64,
            PlanNode::binary_arith(
                ArithKind::Add,
                col("int4", DataType::Int64),
                PlanNode::literal(100i64),
            ),
        ),
    );

    let source = generated_source(
        compile_plan_to_dataflow(&query, vec![t1, t2], dir.path(), config()).unwrap(),
    );

    // the keyed side drives; the plain side is grouped by its join key
    assert!(source.contains(".join(var_0.group_by(|x| x.int1.clone()))"));
    assert!(source.contains(
        ".map(|(_, x)| Struct_var_3{agg2: x.0.agg2, int1: x.1.int1, string1: x.1.string1, \
         int4: x.1.int4})"
    ));
    // the mutation runs on the keyed joined stream
    assert!(source.contains(
        ".map(|(_, x)| Struct_var_4{agg2: x.agg2, int1: x.int1, string1: x.string1, \
         int4: x.int4, mut4: x.int4.map(|v| v + 100)})"
    ));
}

#[test]
fn test_outer_join_unwraps_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let t1 = write_table(&dir, "t1", "int1,string1\n1,x\n");
    let t2 = write_table(&dir, "t2", "int1,int3\n1,10\n");

    let query = PlanNode::join(
        JoinKind::FullOuter,
        PlanNode::table_scan("t1", t1_schema()),
        PlanNode::table_scan("t2", t2_schema()),
        vec![PlanNode::comparison(
            ComparisonKind::Equals,
            col("int1", DataType::Int64),
            col("int1", DataType::Int64),
        )],
    );

    let source = generated_source(
        compile_plan_to_dataflow(&query, vec![t1, t2], dir.path(), config()).unwrap(),
    );

    assert!(source.contains(".outer_join(var_0, |x| x.int1.clone(), |y| y.int1.clone())"));
    assert!(source.contains(".map(|(_, (x, y))| (x.unwrap_or_default(), y.unwrap_or_default()))"));
}

#[test]
fn test_explicit_window() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int4,string1\n1,a\n2,a\n3,b\n");

    let schema = Schema::new(vec![
        Field::non_null(DataType::Int64, "int4"),
        Field::non_null(DataType::Varchar, "string1"),
    ]);
    let query = mutate(
        PlanNode::table_scan("t1", schema),
        PlanNode::alias(
            "group_sum",
            DataType::Int64,
            PlanNode::window_aggregate(
                PlanNode::reduction(ReduceKind::Sum, PlanNode::column("int4", DataType::Int64, false)),
                WindowSpec {
                    group_by: "string1".into(),
                    preceding: 1,
                    following: 0,
                },
            ),
        ),
    );

    let source = generated_source(
        compile_plan_to_dataflow(&query, vec![table], dir.path(), config()).unwrap(),
    );

    assert!(source.contains(
        ".group_by(|x| x.string1.clone()).window(CountWindow::sliding(2, 1))\
         .fold(Struct_var_1::default(), |acc, x| {acc.group_sum = acc.group_sum + x.int4;})"
    ));
}

#[test]
fn test_compilation_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int1,string1\n1,a\n");

    let build = || {
        let scan = PlanNode::table_scan("t1", t1_schema());
        project(
            filter(
                scan,
                PlanNode::comparison(
                    ComparisonKind::Equals,
                    col("string1", DataType::Varchar),
                    PlanNode::literal("a"),
                ),
            ),
            vec![col("int1", DataType::Int64)],
        )
    };

    let first = generated_source(
        compile_plan_to_dataflow(&build(), vec![table.clone()], dir.path(), config()).unwrap(),
    );
    let second = generated_source(
        compile_plan_to_dataflow(&build(), vec![table], dir.path(), config()).unwrap(),
    );
    assert_eq!(first, second);
}

#[test]
fn test_render_query_graph_writes_dot_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int1,string1\n1,a\n");

    let query = project(
        PlanNode::table_scan("t1", t1_schema()),
        vec![col("int1", DataType::Int64)],
    );
    let config = CompilerConfig {
        run_after_gen: false,
        render_query_graph: true,
        ..CompilerConfig::default()
    };
    compile_plan_to_dataflow(&query, vec![table], dir.path(), config).unwrap();

    let dot = fs::read_to_string(dir.path().join("out").join("query.dot")).unwrap();
    assert!(dot.starts_with("digraph query {"));
    assert!(dot.contains("TableScan"));
}

#[test]
fn test_bypass_leaves_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let query = PlanNode::table_scan("t1", t1_schema());
    let config = CompilerConfig {
        perform_compilation: false,
        ..CompilerConfig::default()
    };
    let outcome = compile_plan_to_dataflow(&query, vec![], dir.path(), config).unwrap();
    assert!(matches!(outcome, CompileOutcome::Bypassed));
    assert!(!dir.path().join("renoir-template").exists());
}

#[test]
fn test_header_disagreement_is_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "id,name\n1,a\n");

    let query = PlanNode::table_scan("t1", t1_schema());
    let err = compile_plan_to_dataflow(&query, vec![table], dir.path(), config()).unwrap_err();
    assert_eq!(err.kind(), "SchemaMismatch");
    assert!(err.to_string().contains("`id`"));
}

#[test]
fn test_unknown_filter_column_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(&dir, "t1", "int1,string1\n1,a\n");

    let query = filter(
        PlanNode::table_scan("t1", t1_schema()),
        PlanNode::comparison(
            ComparisonKind::Equals,
            col("missing", DataType::Int64),
            PlanNode::literal(1i64),
        ),
    );
    let err = compile_plan_to_dataflow(&query, vec![table], dir.path(), config()).unwrap_err();
    assert_eq!(err.kind(), "MalformedPlan");
    assert!(err.to_string().contains("`missing`"));
}

#[test]
fn test_projection_directly_after_join_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let t1 = write_table(&dir, "t1", "int1,string1\n1,a\n");
    let t2 = write_table(&dir, "t2", "int1,int3\n1,10\n");

    let joined = PlanNode::join(
        JoinKind::Inner,
        PlanNode::table_scan("t1", t1_schema()),
        PlanNode::table_scan("t2", t2_schema()),
        vec![PlanNode::comparison(
            ComparisonKind::Equals,
            col("int1", DataType::Int64),
            col("int1", DataType::Int64),
        )],
    );
    // an empty selection in between hides the join from the child check, so
    // the projection itself lands right behind the join operator
    let wrapped = PlanNode::selection(joined, vec![], vec![]);
    let query = project(wrapped, vec![col("string1", DataType::Varchar)]);

    let err = compile_plan_to_dataflow(&query, vec![t1, t2], dir.path(), config()).unwrap_err();
    assert_eq!(err.kind(), "UnsupportedPlan");
}

#[test]
fn test_plan_without_table_scan_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let query = PlanNode::literal(1i64);
    let err = compile_plan_to_dataflow(&query, vec![], dir.path(), config()).unwrap_err();
    assert_eq!(err.kind(), "MalformedPlan");
}
