use super::{to_transport_value, ColumnDescription, Engine, EngineError, Row, Schema};
use crate::data::datatable::{DataColumn, DataRow, DataTable, DataType, DataValue};
use crate::query::describe_statement;
use crate::sql::parser::{
    parse_statement, ComparisonOp, Expr, SelectItem, SelectStatement, SortDirection, Statement,
    TableSource,
};
use async_trait::async_trait;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Columns and rows produced by one statement
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub columns: Vec<DataColumn>,
    pub rows: Vec<DataRow>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Rows as transport-ready JSON objects, in column order
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&row.values)
                    .map(|(column, value)| (column.name.clone(), to_transport_value(value)))
                    .collect()
            })
            .collect()
    }
}

impl From<DataTable> for ResultSet {
    fn from(table: DataTable) -> Self {
        Self {
            columns: table.columns,
            rows: table.rows,
        }
    }
}

/// Engine over tables held in memory.
///
/// Tables are registered once at load time and shared read-only by every
/// query afterwards.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: HashMap<String, Arc<DataTable>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `table` queryable as `name`, replacing any table of the same name
    pub fn register_table(&mut self, name: &str, table: DataTable) {
        debug!(target: "query", "Registering table '{}' ({} rows)", name, table.row_count());
        self.tables.insert(name.to_lowercase(), Arc::new(table));
    }

    pub fn table(&self, name: &str) -> Option<&Arc<DataTable>> {
        self.tables.get(&name.to_lowercase())
    }

    /// Parse and execute one statement
    pub fn query(&self, sql: &str) -> Result<ResultSet, EngineError> {
        trace!(target: "query", "Executing: {}", sql);
        match parse_statement(sql).map_err(EngineError::Syntax)? {
            Statement::Select(select) => self.execute_select(&select).map(ResultSet::from),
            Statement::Describe(select) => {
                let result = self.execute_select(&select)?;
                Ok(describe_table(&result))
            }
        }
    }

    fn execute_select(&self, stmt: &SelectStatement) -> Result<DataTable, EngineError> {
        let source: Cow<'_, DataTable> = match &stmt.from {
            TableSource::Table(name) => Cow::Borrowed(
                self.table(name)
                    .ok_or_else(|| EngineError::MissingRelation(name.clone()))?
                    .as_ref(),
            ),
            TableSource::Subquery(inner) => Cow::Owned(self.execute_select(inner)?),
        };

        // Resolve every column reference before touching rows so that
        // errors surface even when the source is empty.
        let projection = resolve_projection(&stmt.columns, &source)?;
        if let Some(predicate) = &stmt.where_clause {
            check_columns(predicate, &source)?;
        }
        let sort_keys = stmt
            .order_by
            .iter()
            .map(|key| {
                resolve_sort_column(&key.column, &stmt.columns, &source)
                    .map(|index| (index, key.direction))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut selected: Vec<&DataRow> = source
            .rows
            .iter()
            .filter(|row| match &stmt.where_clause {
                Some(predicate) => evaluate(predicate, row, &source) == DataValue::Boolean(true),
                None => true,
            })
            .collect();

        if !sort_keys.is_empty() {
            selected.sort_by(|a, b| {
                for (index, direction) in &sort_keys {
                    let left = a.get(*index).unwrap_or(&DataValue::Null);
                    let right = b.get(*index).unwrap_or(&DataValue::Null);
                    let ordering = match direction {
                        SortDirection::Asc => left.compare(right),
                        SortDirection::Desc => right.compare(left),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let mut output = DataTable::new(source.name.clone());
        for (index, name) in &projection {
            let mut column = source.columns[*index].clone();
            column.name = name.clone();
            output.add_column(column);
        }

        let offset = stmt.offset.unwrap_or(0);
        let limit = stmt.limit.unwrap_or(usize::MAX);
        for row in selected.into_iter().skip(offset).take(limit) {
            let values = projection
                .iter()
                .map(|(index, _)| row.get(*index).cloned().unwrap_or(DataValue::Null))
                .collect();
            output
                .add_row(DataRow::new(values))
                .map_err(EngineError::Execution)?;
        }

        Ok(output)
    }
}

/// Output of `DESCRIBE`: one row per column of the described result
fn describe_table(result: &DataTable) -> ResultSet {
    let columns = ["column_name", "column_type", "null"]
        .into_iter()
        .map(|name| DataColumn::new(name).with_type(DataType::String))
        .collect();
    let rows = result
        .columns
        .iter()
        .map(|column| {
            DataRow::new(vec![
                DataValue::String(column.name.clone()),
                DataValue::String(column.data_type.type_tag().to_string()),
                DataValue::String("YES".to_string()),
            ])
        })
        .collect();
    ResultSet { columns, rows }
}

/// Source column index and output name for each projected column.
/// Repeated output names get `_1`, `_2`, ... suffixes in order.
fn resolve_projection(
    items: &[SelectItem],
    source: &DataTable,
) -> Result<Vec<(usize, String)>, EngineError> {
    let mut projection = Vec::new();
    let mut used: HashSet<String> = HashSet::new();

    let mut push = |index: usize, name: &str, projection: &mut Vec<(usize, String)>| {
        let mut candidate = name.to_string();
        let mut suffix = 1;
        while used.contains(&candidate.to_lowercase()) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        used.insert(candidate.to_lowercase());
        projection.push((index, candidate));
    };

    for item in items {
        match item {
            SelectItem::Wildcard => {
                for (index, column) in source.columns.iter().enumerate() {
                    push(index, &column.name, &mut projection);
                }
            }
            SelectItem::Column { name, alias } => {
                let index = source
                    .get_column_index(name)
                    .ok_or_else(|| EngineError::MissingColumn(name.clone()))?;
                let output_name = alias
                    .as_deref()
                    .unwrap_or(source.columns[index].name.as_str());
                push(index, output_name, &mut projection);
            }
        }
    }
    Ok(projection)
}

/// ORDER BY may name a source column or a select-list alias
fn resolve_sort_column(
    name: &str,
    items: &[SelectItem],
    source: &DataTable,
) -> Result<usize, EngineError> {
    if let Some(index) = source.get_column_index(name) {
        return Ok(index);
    }
    items
        .iter()
        .find_map(|item| match item {
            SelectItem::Column {
                name: column,
                alias: Some(alias),
            } if alias.eq_ignore_ascii_case(name) => source.get_column_index(column),
            _ => None,
        })
        .ok_or_else(|| EngineError::MissingColumn(name.to_string()))
}

fn check_columns(expr: &Expr, source: &DataTable) -> Result<(), EngineError> {
    match expr {
        Expr::Column(name) => source
            .get_column_index(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::MissingColumn(name.clone())),
        Expr::Literal(_) => Ok(()),
        Expr::Comparison { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
            check_columns(left, source)?;
            check_columns(right, source)
        }
        Expr::Like { expr, pattern, .. } => {
            check_columns(expr, source)?;
            check_columns(pattern, source)
        }
        Expr::IsNull { expr, .. } | Expr::Not(expr) => check_columns(expr, source),
    }
}

/// Evaluate with SQL three-valued logic; unknown is `Null`
fn evaluate(expr: &Expr, row: &DataRow, source: &DataTable) -> DataValue {
    match expr {
        Expr::Column(name) => source
            .get_column_index(name)
            .and_then(|index| row.get(index))
            .cloned()
            .unwrap_or(DataValue::Null),
        Expr::Literal(value) => value.clone(),
        Expr::Comparison { left, op, right } => {
            let left = evaluate(left, row, source);
            let right = evaluate(right, row, source);
            match left.sql_cmp(&right) {
                Some(ordering) => DataValue::Boolean(match op {
                    ComparisonOp::Equal => ordering == Ordering::Equal,
                    ComparisonOp::NotEqual => ordering != Ordering::Equal,
                    ComparisonOp::LessThan => ordering == Ordering::Less,
                    ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
                    ComparisonOp::GreaterThan => ordering == Ordering::Greater,
                    ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
                }),
                None => DataValue::Null,
            }
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let value = evaluate(expr, row, source);
            let pattern = evaluate(pattern, row, source);
            if value.is_null() || pattern.is_null() {
                return DataValue::Null;
            }
            let matched = like_match(&value.to_string(), &pattern.to_string());
            DataValue::Boolean(matched != *negated)
        }
        Expr::IsNull { expr, negated } => {
            DataValue::Boolean(evaluate(expr, row, source).is_null() != *negated)
        }
        Expr::And(left, right) => {
            match (truth(&evaluate(left, row, source)), truth(&evaluate(right, row, source))) {
                (Some(false), _) | (_, Some(false)) => DataValue::Boolean(false),
                (Some(true), Some(true)) => DataValue::Boolean(true),
                _ => DataValue::Null,
            }
        }
        Expr::Or(left, right) => {
            match (truth(&evaluate(left, row, source)), truth(&evaluate(right, row, source))) {
                (Some(true), _) | (_, Some(true)) => DataValue::Boolean(true),
                (Some(false), Some(false)) => DataValue::Boolean(false),
                _ => DataValue::Null,
            }
        }
        Expr::Not(inner) => match truth(&evaluate(inner, row, source)) {
            Some(b) => DataValue::Boolean(!b),
            None => DataValue::Null,
        },
    }
}

fn truth(value: &DataValue) -> Option<bool> {
    match value {
        DataValue::Boolean(b) => Some(*b),
        _ => None,
    }
}

/// `%` matches any run of characters, `_` exactly one
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // Classic wildcard matching with backtracking to the last `%`
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

#[async_trait]
impl Engine for MemoryEngine {
    /// Describes through the engine's own `DESCRIBE` statement
    async fn describe(&self, query: &str) -> Result<Schema, EngineError> {
        let described = self.query(&describe_statement(query))?;
        let columns = described
            .rows
            .iter()
            .map(|row| {
                let text = |index: usize| {
                    row.get(index)
                        .map(|value| value.to_string())
                        .unwrap_or_default()
                };
                ColumnDescription::new(text(0), text(1))
            })
            .collect();
        Ok(Schema::new(columns))
    }

    async fn run(&self, query: &str) -> Result<Vec<Row>, EngineError> {
        self.query(query).map(|result| result.to_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> MemoryEngine {
        let mut table = DataTable::new("people");
        table.add_column(DataColumn::new("id").with_type(DataType::Integer));
        table.add_column(DataColumn::new("name").with_type(DataType::String));
        table.add_column(DataColumn::new("age").with_type(DataType::Integer));
        for (id, name, age) in [
            (1, "Alice", Some(34)),
            (2, "Bob", None),
            (3, "Carol", Some(29)),
            (4, "Dave", Some(34)),
        ] {
            table
                .add_row(DataRow::new(vec![
                    DataValue::Integer(id),
                    DataValue::String(name.to_string()),
                    age.map(DataValue::Integer).unwrap_or(DataValue::Null),
                ]))
                .unwrap();
        }
        let mut engine = MemoryEngine::new();
        engine.register_table("people", table);
        engine
    }

    fn ids(result: &ResultSet) -> Vec<i64> {
        result
            .rows
            .iter()
            .map(|row| match row.get(0) {
                Some(DataValue::Integer(i)) => *i,
                other => panic!("unexpected id {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_where_treats_null_comparisons_as_false() {
        let engine = people();
        let result = engine.query("SELECT id FROM people WHERE age >= 30").unwrap();
        assert_eq!(ids(&result), vec![1, 4]);

        let result = engine.query("SELECT id FROM people WHERE NOT age >= 30").unwrap();
        assert_eq!(ids(&result), vec![3]);

        let result = engine.query("SELECT id FROM people WHERE age IS NULL").unwrap();
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_order_by_is_stable_with_nulls_first() {
        let engine = people();
        let result = engine.query("SELECT id FROM people ORDER BY age").unwrap();
        assert_eq!(ids(&result), vec![2, 3, 1, 4]);

        let result = engine
            .query("SELECT id, age AS years FROM people ORDER BY years DESC, id DESC")
            .unwrap();
        assert_eq!(ids(&result), vec![4, 1, 3, 2]);
    }

    #[test]
    fn test_limit_offset_after_ordering() {
        let engine = people();
        let result = engine
            .query("SELECT * FROM (\nSELECT id FROM people ORDER BY id DESC\n) LIMIT 2 OFFSET 1")
            .unwrap();
        assert_eq!(ids(&result), vec![3, 2]);
    }

    #[test]
    fn test_like_patterns() {
        assert!(like_match("Carol", "C%"));
        assert!(like_match("Carol", "%r_l"));
        assert!(like_match("abc", "%"));
        assert!(!like_match("Bob", "A%"));
        assert!(!like_match("Bob", "B_"));

        let engine = people();
        let result = engine
            .query("SELECT id FROM people WHERE name NOT LIKE '%a%'")
            .unwrap();
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_output_names_are_suffixed() {
        let engine = people();
        let result = engine
            .query("SELECT id, id, name AS id FROM people LIMIT 1")
            .unwrap();
        assert_eq!(result.column_names(), vec!["id", "id_1", "id_2"]);
    }

    #[test]
    fn test_errors() {
        let engine = people();
        assert_eq!(
            engine.query("SELECT * FROM trades").unwrap_err(),
            EngineError::MissingRelation("trades".to_string())
        );
        assert_eq!(
            engine.query("SELECT salary FROM people").unwrap_err(),
            EngineError::MissingColumn("salary".to_string())
        );
        assert_eq!(
            engine.query("SELECT * FROM people WHERE (id = 1").unwrap_err().to_string(),
            "syntax error near end of input"
        );
    }

    #[test]
    fn test_describe_statement_rows() {
        let engine = people();
        let result = engine.query("DESCRIBE (\nSELECT id, name FROM people\n)").unwrap();
        let rows = result.to_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["column_name"], "id");
        assert_eq!(rows[0]["column_type"], "BIGINT");
        assert_eq!(rows[1]["null"], "YES");
    }

    #[tokio::test]
    async fn test_describe_matches_describe_rows() {
        let engine = people();
        let schema = engine.describe("SELECT id, id, name AS who FROM people").await.unwrap();
        assert_eq!(schema.names(), vec!["id", "id_1", "who"]);
        assert_eq!(schema.columns[2].column_type, "VARCHAR");
        assert_eq!(
            engine.describe("SELECT * FROM nobody").await.unwrap_err(),
            EngineError::MissingRelation("nobody".to_string())
        );
    }

    #[tokio::test]
    async fn test_engine_port() {
        let engine = people();
        let schema = engine.describe("SELECT name, age FROM People;").await.unwrap();
        assert_eq!(schema.names(), vec!["name", "age"]);
        assert_eq!(schema.columns[1].column_type, "BIGINT");

        let rows = engine
            .run("SELECT * FROM (\nSELECT name FROM people\n) LIMIT 2 OFFSET 0")
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["name"]);
    }
}
