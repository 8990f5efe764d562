//! Boolean predicate trees for declaratively including or excluding table rows.
//!
//! A rule set is an ordered list of named rules, each an `include` or
//! `exclude` around an AND/OR/leaf expression:
//!
//! ```yaml
//! - name: low-qual
//!   exclude:
//!     column: qual
//!     lt: 20
//! - name: nuclear
//!   include:
//!     or:
//!       - {column: chromo, startswith: chr}
//!       - {column: chromo, matches: '[0-9]+'}
//! ```
//!
//! Excluding is compiled as including the logical inverse, with the inversion
//! pushed down to the leaves (De Morgan at AND/OR nodes), so every compiled
//! tree evaluates to a plain row mask.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, FilterError};
use crate::table::Table;
use crate::types::{DType, Value};

/// A top-level named rule as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    #[serde(flatten)]
    pub mode: RuleMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    Include(ExprSpec),
    Exclude(ExprSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExprSpec {
    And { and: Vec<ExprSpec> },
    Or { or: Vec<ExprSpec> },
    Leaf(LeafSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSpec {
    pub column: String,
    #[serde(flatten)]
    pub op: LeafOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafOp {
    Eq(Literal),
    Ne(Literal),
    Gt(Literal),
    Lt(Literal),
    Ge(Literal),
    Le(Literal),
    StartsWith(String),
    EndsWith(String),
    Matches(String),
}

/// Comparison literal; its type decides how column values are coerced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl RuleSpec {
    pub fn include(name: impl Into<String>, expr: ExprSpec) -> Self {
        Self {
            name: name.into(),
            mode: RuleMode::Include(expr),
        }
    }

    pub fn exclude(name: impl Into<String>, expr: ExprSpec) -> Self {
        Self {
            name: name.into(),
            mode: RuleMode::Exclude(expr),
        }
    }

    /// The same rule with include and exclude swapped
    pub fn inverted(&self) -> Self {
        let mode = match &self.mode {
            RuleMode::Include(e) => RuleMode::Exclude(e.clone()),
            RuleMode::Exclude(e) => RuleMode::Include(e.clone()),
        };
        Self {
            name: self.name.clone(),
            mode,
        }
    }
}

impl ExprSpec {
    pub fn leaf(column: impl Into<String>, op: LeafOp) -> Self {
        ExprSpec::Leaf(LeafSpec {
            column: column.into(),
            op,
        })
    }
}

#[derive(Debug, Clone)]
enum Test {
    Eq(Literal),
    Gt(Literal),
    Lt(Literal),
    StartsWith(String),
    EndsWith(String),
    Matches(Regex),
}

#[derive(Debug, Clone)]
struct Leaf {
    column: String,
    test: Test,
    negated: bool,
}

#[derive(Debug, Clone)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Leaf(Leaf),
}

/// A rule compiled into an executable predicate tree
#[derive(Debug, Clone)]
pub struct CompiledRule {
    name: String,
    root: Node,
}

impl CompiledRule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, ConfigError> {
        let root = match &spec.mode {
            RuleMode::Include(expr) => compile_expr(&spec.name, expr, false)?,
            RuleMode::Exclude(expr) => compile_expr(&spec.name, expr, true)?,
        };
        Ok(Self {
            name: spec.name.clone(),
            root,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row mask: `true` for rows that pass the rule
    pub fn evaluate(&self, table: &Table) -> Result<Vec<bool>, FilterError> {
        eval_node(&self.name, &self.root, table)
    }
}

fn compile_expr(rule: &str, expr: &ExprSpec, invert: bool) -> Result<Node, ConfigError> {
    let (children, conjunction) = match expr {
        ExprSpec::And { and } => (and, !invert),
        ExprSpec::Or { or } => (or, invert),
        ExprSpec::Leaf(leaf) => return compile_leaf(rule, leaf, invert).map(Node::Leaf),
    };
    if children.is_empty() {
        return Err(ConfigError::MalformedRule {
            rule: rule.to_string(),
            reason: "and/or requires at least one child".to_string(),
        });
    }
    let mut nodes = children
        .iter()
        .map(|c| compile_expr(rule, c, invert))
        .collect::<Result<Vec<_>, _>>()?;
    if nodes.len() == 1 {
        return Ok(nodes.remove(0));
    }
    Ok(if conjunction {
        Node::And(nodes)
    } else {
        Node::Or(nodes)
    })
}

fn compile_leaf(rule: &str, leaf: &LeafSpec, invert: bool) -> Result<Leaf, ConfigError> {
    let (test, negated) = match &leaf.op {
        LeafOp::Eq(v) => (Test::Eq(v.clone()), false),
        LeafOp::Ne(v) => (Test::Eq(v.clone()), true),
        LeafOp::Gt(v) => (Test::Gt(v.clone()), false),
        LeafOp::Le(v) => (Test::Gt(v.clone()), true),
        LeafOp::Lt(v) => (Test::Lt(v.clone()), false),
        LeafOp::Ge(v) => (Test::Lt(v.clone()), true),
        LeafOp::StartsWith(s) => (Test::StartsWith(s.clone()), false),
        LeafOp::EndsWith(s) => (Test::EndsWith(s.clone()), false),
        LeafOp::Matches(p) => {
            let regex = Regex::new(&format!("^(?:{})", p)).map_err(|source| ConfigError::Regex {
                rule: rule.to_string(),
                source,
            })?;
            (Test::Matches(regex), false)
        }
    };
    Ok(Leaf {
        column: leaf.column.clone(),
        test,
        negated: negated ^ invert,
    })
}

fn eval_node(rule: &str, node: &Node, table: &Table) -> Result<Vec<bool>, FilterError> {
    match node {
        Node::Leaf(leaf) => eval_leaf(rule, leaf, table),
        Node::And(children) | Node::Or(children) => {
            let is_and = matches!(node, Node::And(_));
            let mut mask = vec![is_and; table.n_rows()];
            for child in children {
                let child_mask = eval_node(rule, child, table)?;
                for (m, c) in mask.iter_mut().zip(child_mask) {
                    *m = if is_and { *m && c } else { *m || c };
                }
            }
            Ok(mask)
        }
    }
}

fn eval_leaf(rule: &str, leaf: &Leaf, table: &Table) -> Result<Vec<bool>, FilterError> {
    let column = table
        .column(&leaf.column)
        .ok_or_else(|| FilterError::ColumnNotFound {
            rule: rule.to_string(),
            column: leaf.column.clone(),
        })?;

    column
        .values()
        .iter()
        .map(|cell| {
            let positive = if cell.is_null() {
                false
            } else {
                test_cell(rule, &leaf.column, &leaf.test, cell)?
            };
            Ok(positive != leaf.negated)
        })
        .collect()
}

fn test_cell(rule: &str, column: &str, test: &Test, cell: &Value) -> Result<bool, FilterError> {
    Ok(match test {
        Test::Eq(lit) => compare(rule, column, lit, cell)? == std::cmp::Ordering::Equal,
        Test::Gt(lit) => compare(rule, column, lit, cell)? == std::cmp::Ordering::Greater,
        Test::Lt(lit) => compare(rule, column, lit, cell)? == std::cmp::Ordering::Less,
        Test::StartsWith(s) => cell.to_string().starts_with(s.as_str()),
        Test::EndsWith(s) => cell.to_string().ends_with(s.as_str()),
        Test::Matches(re) => re.is_match(&cell.to_string()),
    })
}

/// Coerce `cell` to the literal's type and compare `cell` against it
fn compare(
    rule: &str,
    column: &str,
    lit: &Literal,
    cell: &Value,
) -> Result<std::cmp::Ordering, FilterError> {
    let fail = |target: &'static str| FilterError::Coercion {
        rule: rule.to_string(),
        column: column.to_string(),
        value: cell.to_string(),
        target,
    };
    match lit {
        Literal::Int(v) => {
            let x = match cell {
                Value::Float(f) => f.trunc() as i64,
                Value::Str(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .ok()
                        .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                        .ok_or_else(|| fail("int"))?
                }
                other => other.as_i64().ok_or_else(|| fail("int"))?,
            };
            Ok(x.cmp(v))
        }
        Literal::Float(v) => {
            let x = match cell {
                Value::Str(s) => s.trim().parse::<f64>().map_err(|_| fail("float"))?,
                other => other.as_f64().ok_or_else(|| fail("float"))?,
            };
            x.partial_cmp(v).ok_or_else(|| fail("float"))
        }
        Literal::Str(v) => Ok(cell.to_string().as_str().cmp(v.as_str())),
        Literal::Bool(v) => {
            let x = match cell {
                Value::Str(s) => match DType::Bool.parse(s) {
                    Some(Value::Bool(b)) => b,
                    _ => cell.is_truthy(),
                },
                other => other.is_truthy(),
            };
            Ok(x.cmp(v))
        }
    }
}

/// An ordered, compiled rule set
#[derive(Debug, Clone, Default)]
pub struct FilterTree {
    rules: Vec<CompiledRule>,
}

impl FilterTree {
    pub fn compile(specs: &[RuleSpec]) -> Result<Self, ConfigError> {
        let rules = specs
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule in order, dropping failing rows after each one.
    /// Stops early once the table is empty.
    pub fn apply(&self, mut table: Table) -> Result<Table, FilterError> {
        self.apply_in_place(&mut table)?;
        Ok(table)
    }

    pub fn apply_in_place(&self, table: &mut Table) -> Result<(), FilterError> {
        if table.is_empty() {
            return Ok(());
        }
        for rule in &self.rules {
            let before = table.n_rows();
            let mask = rule.evaluate(table)?;
            table.retain(&mask);
            debug!("{}: {} => {}", rule.name(), before, table.n_rows());
            if table.is_empty() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn variants() -> Table {
        Table::from_rows(
            &[
                ("chromo", DType::Category),
                ("pos", DType::UInt),
                ("qual", DType::UInt),
                ("gene_id", DType::Text),
            ],
            vec![
                vec!["chr1".into(), Value::Int(100), Value::Int(10), "AT1G00001".into()],
                vec!["chr1".into(), Value::Int(200), Value::Int(25), "AT2G00002".into()],
                vec!["chr2".into(), Value::Int(300), Value::Int(30), "".into()],
                vec!["chrC".into(), Value::Int(400), Value::Null, "ATCG00010".into()],
            ],
        )
        .unwrap()
    }

    fn positions(table: &Table) -> Vec<i64> {
        table
            .column("pos")
            .unwrap()
            .values()
            .iter()
            .filter_map(Value::as_i64)
            .collect()
    }

    fn parse(yaml: &str) -> Vec<RuleSpec> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_exclude_low_quality() {
        let table = Table::new()
            .with_column(Column::new(
                "qual",
                DType::UInt,
                vec![Value::Int(10), Value::Int(25), Value::Int(30)],
            ))
            .unwrap();
        let rules = parse("- {name: low-qual, exclude: {column: qual, lt: 20}}");
        let tree = FilterTree::compile(&rules).unwrap();
        let filtered = tree.apply(table).unwrap();
        assert_eq!(
            filtered.column("qual").unwrap().values(),
            &[Value::Int(25), Value::Int(30)]
        );
    }

    #[test]
    fn test_nested_yaml_rules() {
        let rules = parse(
            r#"
- name: nuclear
  include:
    or:
      - {column: chromo, eq: chr1}
      - and:
          - {column: chromo, startswith: chr}
          - {column: pos, ge: 300}
"#,
        );
        let tree = FilterTree::compile(&rules).unwrap();
        assert_eq!(positions(&tree.apply(variants()).unwrap()), vec![100, 200, 300, 400]);

        let rules = parse(
            r#"
- name: gene-hits
  include:
    and:
      - {column: gene_id, matches: 'AT[1-5]G'}
      - {column: qual, gt: 15}
"#,
        );
        let tree = FilterTree::compile(&rules).unwrap();
        assert_eq!(positions(&tree.apply(variants()).unwrap()), vec![200]);
    }

    #[test]
    fn test_inverted_rule_is_exact_complement() {
        let exprs = vec![
            ExprSpec::leaf("qual", LeafOp::Ge(Literal::Int(25))),
            ExprSpec::leaf("chromo", LeafOp::EndsWith("1".into())),
            ExprSpec::Or {
                or: vec![
                    ExprSpec::leaf("gene_id", LeafOp::Matches("AT2".into())),
                    ExprSpec::And {
                        and: vec![
                            ExprSpec::leaf("pos", LeafOp::Gt(Literal::Float(150.0))),
                            ExprSpec::leaf("chromo", LeafOp::Ne(Literal::Str("chr2".into()))),
                        ],
                    },
                ],
            },
        ];
        for expr in exprs {
            let rule = RuleSpec::include("r", expr);
            let kept = positions(&FilterTree::compile(&[rule.clone()]).unwrap().apply(variants()).unwrap());
            let dropped = positions(
                &FilterTree::compile(&[rule.inverted()])
                    .unwrap()
                    .apply(variants())
                    .unwrap(),
            );
            let mut all: Vec<i64> = kept.iter().chain(&dropped).copied().collect();
            all.sort();
            assert_eq!(all, vec![100, 200, 300, 400], "{:?} / {:?}", kept, dropped);
            assert!(kept.iter().all(|p| !dropped.contains(p)));
        }
    }

    #[test]
    fn test_empty_rule_set_is_noop_and_application_is_idempotent() {
        let tree = FilterTree::compile(&[]).unwrap();
        assert_eq!(tree.apply(variants()).unwrap(), variants());

        let rules = parse("- {name: q, include: {column: qual, gt: 12}}");
        let tree = FilterTree::compile(&rules).unwrap();
        let once = tree.apply(variants()).unwrap();
        let twice = tree.apply(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_column_names_rule() {
        let rules = parse("- {name: cover, include: {column: cov, gt: 5}}");
        let tree = FilterTree::compile(&rules).unwrap();
        let err = tree.apply(variants()).unwrap_err();
        match err {
            FilterError::ColumnNotFound { rule, column } => {
                assert_eq!(rule, "cover");
                assert_eq!(column, "cov");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_stops_once_table_is_empty() {
        let rules = parse(
            r#"
- {name: none, include: {column: pos, gt: 1000}}
- {name: never-evaluated, include: {column: missing, eq: 1}}
"#,
        );
        let tree = FilterTree::compile(&rules).unwrap();
        let mut table = variants();
        tree.apply_in_place(&mut table).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_regex_is_anchored_at_start() {
        let rules = parse("- {name: m, include: {column: gene_id, matches: 'G0000'}}");
        let tree = FilterTree::compile(&rules).unwrap();
        assert!(tree.apply(variants()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_rules_are_config_errors() {
        let rules = vec![RuleSpec::include("empty", ExprSpec::And { and: vec![] })];
        assert!(matches!(
            FilterTree::compile(&rules),
            Err(ConfigError::MalformedRule { .. })
        ));
        let rules = parse("- {name: bad, include: {column: gene_id, matches: '(['}}");
        assert!(matches!(
            FilterTree::compile(&rules),
            Err(ConfigError::Regex { .. })
        ));
    }

    #[test]
    fn test_uncoercible_value_is_an_error() {
        let rules = parse("- {name: num, include: {column: gene_id, gt: 3}}");
        let tree = FilterTree::compile(&rules).unwrap();
        assert!(matches!(
            tree.apply(variants()),
            Err(FilterError::Coercion { .. })
        ));
    }
}
