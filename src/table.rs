//! In-memory column-oriented variant tables.
//!
//! Tables are replaced wholesale between pipeline stages: every transform here
//! takes `&self` (or consumes `self`) and returns a new table. Categorical
//! columns keep their category set sorted, so category order and lexical order
//! coincide when sorting.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::columns::ColumnKey;
use crate::error::TableError;
use crate::types::{DType, Value};

type Result<T> = std::result::Result<T, TableError>;

/// A named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: DType,
    categories: Vec<Arc<str>>,
    values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<Value>) -> Self {
        let mut column = Self {
            name: name.into(),
            dtype,
            categories: Vec::new(),
            values,
        };
        if dtype == DType::Category {
            for v in column.values.iter_mut() {
                if !matches!(v, Value::Null | Value::Str(_)) {
                    *v = Value::from(v.to_string());
                }
            }
            column.categories = observed_categories(&column.values);
        }
        column
    }

    /// Column typed from the registry when `name` is a known key, text otherwise
    pub fn for_key(name: impl Into<String>, values: Vec<Value>) -> Self {
        let name = name.into();
        let dtype = ColumnKey::from_key(&name)
            .map(|k| k.dtype())
            .unwrap_or(DType::Text);
        Self::new(name, dtype, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, row: usize) -> &Value {
        &self.values[row]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Recognized category set; empty for non-categorical columns
    pub fn categories(&self) -> &[Arc<str>] {
        &self.categories
    }

    pub fn is_categorical(&self) -> bool {
        self.dtype == DType::Category
    }

    /// Replace the category set. Values outside the new set become missing.
    pub fn set_categories(&mut self, mut categories: Vec<Arc<str>>) {
        categories.sort();
        categories.dedup();
        let known: HashSet<&str> = categories.iter().map(|c| c.as_ref()).collect();
        for v in self.values.iter_mut() {
            if let Value::Str(s) = v {
                if !known.contains(s.as_ref()) {
                    *v = Value::Null;
                }
            }
        }
        self.categories = categories;
    }

    pub fn remove_unused_categories(&mut self) {
        if self.is_categorical() {
            self.categories = observed_categories(&self.values);
        }
    }

    /// Whole-column value replacement through `f`
    pub fn map(&mut self, f: impl Fn(&Value) -> Value) {
        for v in self.values.iter_mut() {
            *v = f(v);
        }
        if self.is_categorical() {
            let mut cats: BTreeSet<Arc<str>> = self.categories.iter().cloned().collect();
            cats.extend(observed_categories(&self.values));
            self.categories = cats.into_iter().collect();
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            dtype: self.dtype,
            categories: self.categories.clone(),
            values: rows.iter().map(|&r| self.values[r].clone()).collect(),
        }
    }

    fn nulls_like(&self, len: usize) -> Column {
        Column {
            name: self.name.clone(),
            dtype: self.dtype,
            categories: Vec::new(),
            values: vec![Value::Null; len],
        }
    }
}

fn observed_categories(values: &[Value]) -> Vec<Arc<str>> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Ordered collection of equally long columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from row tuples matching `schema`
    pub fn from_rows<S: AsRef<str>>(schema: &[(S, DType)], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut cols: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); schema.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(TableError::LengthMismatch {
                    column: format!("row {}", i),
                    expected: schema.len(),
                    actual: row.len(),
                });
            }
            for (col, v) in cols.iter_mut().zip(row) {
                col.push(v);
            }
        }
        let mut table = Table::new();
        for ((name, dtype), values) in schema.iter().zip(cols) {
            table.push_column(Column::new(name.as_ref(), *dtype, values))?;
        }
        Ok(table)
    }

    /// Builder-style column append
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        self.push_column(column)?;
        Ok(self)
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.columns.is_empty() {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            let actual = column.len();
            return Err(TableError::LengthMismatch {
                column: column.name,
                expected: self.n_rows,
                actual,
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace a same-named column in place, or append it
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        match self.position(column.name()) {
            Some(i) if column.len() == self.n_rows => {
                self.columns[i] = column;
                Ok(())
            }
            Some(_) => {
                let actual = column.len();
                Err(TableError::LengthMismatch {
                    column: column.name,
                    expected: self.n_rows,
                    actual,
                })
            }
            None => self.push_column(column),
        }
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let i = self.position(name)?;
        let column = self.columns.remove(i);
        if self.columns.is_empty() {
            self.n_rows = 0;
        }
        Some(column)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    fn require_all(&self, names: &[&str]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                self.position(n)
                    .ok_or_else(|| TableError::ColumnNotFound(n.to_string()))
            })
            .collect()
    }

    /// Cells of one row, in column order
    pub fn row(&self, row: usize) -> impl Iterator<Item = &Value> + '_ {
        self.columns.iter().map(move |c| &c.values[row])
    }

    fn key(&self, cols: &[usize], row: usize) -> Vec<Value> {
        cols.iter().map(|&c| self.columns[c].values[row].clone()).collect()
    }

    /// New table holding `rows`, in the given order
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            n_rows: rows.len(),
        }
    }

    /// New table keeping only rows whose mask entry is true
    pub fn filter(&self, mask: &[bool]) -> Table {
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take(&rows)
    }

    /// Drop rows whose mask entry is false
    pub fn retain(&mut self, mask: &[bool]) {
        if mask.iter().all(|&keep| keep) {
            return;
        }
        *self = self.filter(mask);
    }

    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let cols = self.require_all(names)?;
        Ok(Table {
            columns: cols.iter().map(|&i| self.columns[i].clone()).collect(),
            n_rows: self.n_rows,
        })
    }

    /// Replace missing cells with the registry fill value of each known column.
    /// Must run before any group-by or pivot that should keep those rows.
    pub fn fill_missing(&mut self) {
        for column in self.columns.iter_mut() {
            let Some(fill) = ColumnKey::from_key(&column.name).and_then(|k| k.fill()) else {
                continue;
            };
            if column.values.iter().any(Value::is_null) {
                column.map(|v| if v.is_null() { fill.clone() } else { v.clone() });
            }
        }
    }

    pub fn remove_unused_categories(&mut self) {
        for column in self.columns.iter_mut() {
            column.remove_unused_categories();
        }
    }

    /// Stable multi-key sort; `(column, ascending)` pairs. Missing values
    /// sort last in either direction.
    pub fn sort_by(&self, keys: &[(&str, bool)]) -> Result<Table> {
        let names: Vec<&str> = keys.iter().map(|(n, _)| *n).collect();
        let cols = self.require_all(&names)?;
        let mut order: Vec<usize> = (0..self.n_rows).collect();
        order.sort_by(|&a, &b| {
            for (&c, &(_, ascending)) in cols.iter().zip(keys) {
                let (x, y) = (&self.columns[c].values[a], &self.columns[c].values[b]);
                let ord = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    _ if ascending => x.total_cmp(y),
                    _ => y.total_cmp(x),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(self.take(&order))
    }

    /// Group rows by `keys`, dropping rows with a missing key. Groups are
    /// ordered by their key values.
    pub fn group_by(&self, keys: &[&str]) -> Result<GroupBy<'_>> {
        let key_cols = self.require_all(keys)?;
        let mut slots: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
        for row in 0..self.n_rows {
            let key = self.key(&key_cols, row);
            if key.iter().any(Value::is_null) {
                continue;
            }
            match slots.get(&key) {
                Some(&slot) => groups[slot].1.push(row),
                None => {
                    slots.insert(key.clone(), groups.len());
                    groups.push((key, vec![row]));
                }
            }
        }
        groups.sort_by(|(a, _), (b, _)| compare_keys(a, b));
        Ok(GroupBy {
            table: self,
            key_cols,
            groups,
        })
    }

    /// Join `right` onto this table, matching this table's same-named columns
    /// against `right.index`. Row order of `self` is preserved; right data
    /// columns are appended (replacing same-named columns).
    pub fn join_indexed(&self, right: &IndexedTable, how: JoinHow) -> Result<Table> {
        let index_names = right.index.column_names();
        let left_cols = self.require_all(&index_names)?;
        let all_index: Vec<usize> = (0..right.index.columns.len()).collect();

        let mut lookup: HashMap<Vec<Value>, usize> = HashMap::new();
        for row in 0..right.index.n_rows {
            lookup.entry(right.index.key(&all_index, row)).or_insert(row);
        }

        let mut left_rows = Vec::with_capacity(self.n_rows);
        let mut right_rows = Vec::with_capacity(self.n_rows);
        for row in 0..self.n_rows {
            let hit = lookup.get(&self.key(&left_cols, row)).copied();
            match (hit, how) {
                (None, JoinHow::Inner) => continue,
                _ => {
                    left_rows.push(row);
                    right_rows.push(hit);
                }
            }
        }

        let mut joined = self.take(&left_rows);
        for column in &right.data.columns {
            let values = right_rows
                .iter()
                .map(|r| r.map(|r| column.values[r].clone()).unwrap_or(Value::Null))
                .collect();
            joined.set_column(Column {
                name: column.name.clone(),
                dtype: column.dtype,
                categories: column.categories.clone(),
                values,
            })?;
        }
        Ok(joined)
    }
}

/// Join flavor for [`Table::join_indexed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
}

fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Rows grouped by a set of key columns
pub struct GroupBy<'a> {
    table: &'a Table,
    key_cols: Vec<usize>,
    groups: Vec<(Vec<Value>, Vec<usize>)>,
}

impl<'a> GroupBy<'a> {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group keys with the rows belonging to each group
    pub fn groups(&self) -> impl Iterator<Item = (&[Value], &[usize])> + '_ {
        self.groups.iter().map(|(k, rows)| (k.as_slice(), rows.as_slice()))
    }

    fn index_table(&self) -> Table {
        let columns = self
            .key_cols
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let source = &self.table.columns[c];
                Column {
                    name: source.name.clone(),
                    dtype: source.dtype,
                    categories: source.categories.clone(),
                    values: self.groups.iter().map(|(k, _)| k[i].clone()).collect(),
                }
            })
            .collect();
        Table {
            columns,
            n_rows: self.groups.len(),
        }
    }

    /// Number of distinct non-missing values of `column` per group, as `name`
    pub fn nunique(&self, column: &str, name: &str) -> Result<IndexedTable> {
        let source = self.table.require(column)?;
        let counts = self
            .groups
            .iter()
            .map(|(_, rows)| {
                let distinct: HashSet<&Value> = rows
                    .iter()
                    .map(|&r| &source.values[r])
                    .filter(|v| !v.is_null())
                    .collect();
                Value::Int(distinct.len() as i64)
            })
            .collect();
        Ok(IndexedTable {
            index: self.index_table(),
            data: Table::new().with_column(Column::new(name, DType::UInt, counts))?,
        })
    }

    /// Count rows per group for every observed value of `columns`, one output
    /// column per value (zero where absent). Rows missing that value are ignored.
    pub fn pivot_count(&self, columns: &str) -> Result<IndexedTable> {
        let source = self.table.require(columns)?;
        let mut pivot_values: Vec<Value> = self
            .groups
            .iter()
            .flat_map(|(_, rows)| rows.iter().map(|&r| &source.values[r]))
            .filter(|v| !v.is_null())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        pivot_values.sort_by(|a, b| a.total_cmp(b));
        let slot: HashMap<&Value, usize> =
            pivot_values.iter().enumerate().map(|(i, v)| (v, i)).collect();

        let mut counts = vec![vec![0i64; self.groups.len()]; pivot_values.len()];
        for (g, (_, rows)) in self.groups.iter().enumerate() {
            for &r in rows {
                if let Some(&s) = slot.get(&source.values[r]) {
                    counts[s][g] += 1;
                }
            }
        }

        let mut data = Table::new();
        for (value, col_counts) in pivot_values.iter().zip(counts) {
            let values = col_counts.into_iter().map(Value::Int).collect();
            data.push_column(Column::new(value.to_string(), DType::UInt, values))?;
        }
        if data.columns.is_empty() {
            data.n_rows = self.groups.len();
        }
        Ok(IndexedTable {
            index: self.index_table(),
            data,
        })
    }
}

/// Result of a group-by or pivot: index columns plus aggregated data columns,
/// aligned by row position
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTable {
    pub index: Table,
    pub data: Table,
}

impl IndexedTable {
    pub fn n_rows(&self) -> usize {
        self.index.n_rows
    }

    /// Turn every index level into an explicit leading column
    pub fn flatten_index(self) -> Table {
        let n_rows = self.index.n_rows;
        let mut columns = self.index.columns;
        columns.extend(self.data.columns);
        Table { columns, n_rows }
    }
}

/// Append `b` below `a`. Shared categorical columns get the union of both
/// category sets first, so no value is lost to a mismatched category set.
/// Columns present on only one side are filled with missing values.
pub fn concat(a: Table, b: Table) -> Table {
    if a.columns.is_empty() {
        return b;
    }
    if b.columns.is_empty() {
        return a;
    }

    let mut names: Vec<String> = a.columns.iter().map(|c| c.name.clone()).collect();
    for c in &b.columns {
        if !names.contains(&c.name) {
            names.push(c.name.clone());
        }
    }

    let n_rows = a.n_rows + b.n_rows;
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        let left = a.column(name);
        let right = b.column(name);
        let (left, right) = match (left, right) {
            (Some(l), Some(r)) => (l.clone(), r.clone()),
            (Some(l), None) => (l.clone(), l.nulls_like(b.n_rows)),
            (None, Some(r)) => (r.nulls_like(a.n_rows), r.clone()),
            (None, None) => continue,
        };

        let dtype = left.dtype;
        let categories = if dtype == DType::Category {
            let mut union: BTreeSet<Arc<str>> = left.categories.iter().cloned().collect();
            union.extend(right.categories.iter().cloned());
            union.extend(observed_categories(&right.values));
            union.into_iter().collect()
        } else {
            Vec::new()
        };

        let mut values = left.values;
        values.extend(right.values);
        columns.push(Column {
            name: name.clone(),
            dtype,
            categories,
            values,
        });
    }
    Table { columns, n_rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(values: &[&str]) -> Vec<Value> {
        values.iter().map(|&v| Value::from(v)).collect()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&v| Value::Int(v)).collect()
    }

    #[test]
    fn test_concat_unions_categories() {
        let a = Table::new()
            .with_column(Column::new("hh", DType::Category, cat(&["Het", "Het"])))
            .unwrap();
        let b = Table::new()
            .with_column(Column::new("hh", DType::Category, cat(&["Hom"])))
            .unwrap();
        let c = concat(a, b);
        let hh = c.column("hh").unwrap();
        assert_eq!(c.n_rows(), 3);
        let cats: Vec<&str> = hh.categories().iter().map(|s| s.as_ref()).collect();
        assert_eq!(cats, vec!["Het", "Hom"]);
        assert!(hh.values().iter().all(|v| !v.is_null()));
    }

    #[test]
    fn test_concat_fills_one_sided_columns() {
        let a = Table::new()
            .with_column(Column::new("pos", DType::UInt, ints(&[1])))
            .unwrap();
        let b = Table::new()
            .with_column(Column::new("pos", DType::UInt, ints(&[2])))
            .unwrap()
            .with_column(Column::new("qual", DType::UInt, ints(&[30])))
            .unwrap();
        let c = concat(a, b);
        assert_eq!(c.column_names(), vec!["pos", "qual"]);
        assert_eq!(c.column("qual").unwrap().values(), &[Value::Null, Value::Int(30)]);
    }

    #[test]
    fn test_set_categories_drops_unknown_values() {
        let mut col = Column::new("hh", DType::Category, cat(&["Het", "Hom"]));
        col.set_categories(vec![Arc::from("Hom")]);
        assert_eq!(col.values(), &[Value::Null, Value::from("Hom")]);
    }

    #[test]
    fn test_group_by_nunique_skips_missing_keys() {
        let t = Table::from_rows(
            &[("pos", DType::UInt), ("pool", DType::Category)],
            vec![
                vec![Value::Int(100), Value::from("P1")],
                vec![Value::Int(100), Value::from("P2")],
                vec![Value::Int(100), Value::from("P2")],
                vec![Value::Null, Value::from("P1")],
                vec![Value::Int(5), Value::from("P1")],
            ],
        )
        .unwrap();
        let counts = t.group_by(&["pos"]).unwrap().nunique("pool", "n").unwrap();
        assert_eq!(counts.index.column("pos").unwrap().values(), &ints(&[5, 100])[..]);
        assert_eq!(counts.data.column("n").unwrap().values(), &ints(&[1, 2])[..]);
    }

    #[test]
    fn test_pivot_count_and_flatten() {
        let t = Table::from_rows(
            &[("gene", DType::Text), ("hh", DType::Category)],
            vec![
                vec![Value::from("G1"), Value::from("Hom")],
                vec![Value::from("G1"), Value::from("Het")],
                vec![Value::from("G2"), Value::from("Het")],
            ],
        )
        .unwrap();
        let flat = t
            .group_by(&["gene"])
            .unwrap()
            .pivot_count("hh")
            .unwrap()
            .flatten_index();
        assert_eq!(flat.column_names(), vec!["gene", "Het", "Hom"]);
        assert_eq!(flat.column("Hom").unwrap().values(), &ints(&[1, 0])[..]);
        assert_eq!(flat.column("Het").unwrap().values(), &ints(&[1, 1])[..]);
    }

    #[test]
    fn test_join_inner_and_left() {
        let t = Table::from_rows(
            &[("gene_id", DType::Text)],
            vec![vec![Value::from("A")], vec![Value::from("B")], vec![Value::from("A")]],
        )
        .unwrap();
        let right = IndexedTable {
            index: Table::from_rows(&[("gene_id", DType::Text)], vec![vec![Value::from("A")]])
                .unwrap(),
            data: Table::from_rows(&[("flag", DType::Bool)], vec![vec![Value::Bool(true)]])
                .unwrap(),
        };
        let inner = t.join_indexed(&right, JoinHow::Inner).unwrap();
        assert_eq!(inner.n_rows(), 2);
        let left = t.join_indexed(&right, JoinHow::Left).unwrap();
        assert_eq!(
            left.column("flag").unwrap().values(),
            &[Value::Bool(true), Value::Null, Value::Bool(true)]
        );
    }

    #[test]
    fn test_sort_by_mixed_directions_is_stable() {
        let t = Table::from_rows(
            &[("pos", DType::UInt), ("hh", DType::Category), ("id", DType::UInt)],
            vec![
                vec![Value::Int(2), Value::from("Het"), Value::Int(0)],
                vec![Value::Int(1), Value::from("Het"), Value::Int(1)],
                vec![Value::Int(1), Value::from("Hom"), Value::Int(2)],
                vec![Value::Int(1), Value::from("Het"), Value::Int(3)],
                vec![Value::Null, Value::from("Hom"), Value::Int(4)],
            ],
        )
        .unwrap();
        let sorted = t.sort_by(&[("pos", true), ("hh", false)]).unwrap();
        assert_eq!(sorted.column("id").unwrap().values(), &ints(&[2, 1, 3, 0, 4])[..]);
    }

    #[test]
    fn test_fill_missing_uses_registry_defaults() {
        let mut t = Table::from_rows(
            &[("qual", DType::UInt), ("gene_id", DType::Text), ("chromo", DType::Category)],
            vec![vec![Value::Null, Value::Null, Value::Null]],
        )
        .unwrap();
        t.fill_missing();
        assert_eq!(t.column("qual").unwrap().get(0), &Value::Int(-1));
        assert_eq!(t.column("gene_id").unwrap().get(0), &Value::from(""));
        assert!(t.column("chromo").unwrap().get(0).is_null());
    }

    #[test]
    fn test_length_mismatch_names_the_column() {
        let mut t = Table::new()
            .with_column(Column::new("pos", DType::UInt, ints(&[1, 2])))
            .unwrap();
        match t.push_column(Column::new("qual", DType::UInt, ints(&[30]))) {
            Err(TableError::LengthMismatch { column, expected, actual }) => {
                assert_eq!(column, "qual");
                assert_eq!((expected, actual), (2, 1));
            }
            other => panic!("expected LengthMismatch, got {:?}", other),
        }
        match t.set_column(Column::new("pos", DType::UInt, ints(&[1, 2, 3]))) {
            Err(TableError::LengthMismatch { column, expected, actual }) => {
                assert_eq!(column, "pos");
                assert_eq!((expected, actual), (2, 3));
            }
            other => panic!("expected LengthMismatch, got {:?}", other),
        }
        assert_eq!(t.column_names(), vec!["pos"]);
    }
}
