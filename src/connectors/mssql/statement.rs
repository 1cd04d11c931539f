//! Parameterized insert statements
//!
//! Configured statements name their values with `@field` placeholders:
//!
//! ```sql
//! INSERT INTO Items (No, Name) VALUES (@no, @name)
//! ```
//!
//! For each record, every `@name` that is a field of the (renamed) record
//! becomes a positional parameter (`@P1`, `@P2`, ..) and the field's value is
//! bound to it. Values are never spliced into the SQL text. Any other `@name`
//! is kept verbatim, so T-SQL local variables keep working. Text inside
//! single-quoted literals and `--` comments is never scanned, and system
//! variables such as `@@IDENTITY` are left alone.

use crate::envelope::{FieldMapping, Record};
use serde_json::Value;
use std::borrow::Cow;
use tiberius::{ColumnData, ToSql};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Sql(String),
    Placeholder(String),
}

/// An insert statement split into SQL text and `@name` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTemplate {
    segments: Vec<Segment>,
}

impl InsertTemplate {
    pub fn parse(statement: &str) -> Self {
        let mut segments = Vec::new();
        let mut sql = String::new();
        let mut chars = statement.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    // '' inside a literal closes and reopens it, which copies it intact
                    sql.push(c);
                    for c in chars.by_ref() {
                        sql.push(c);
                        if c == '\'' {
                            break;
                        }
                    }
                }
                '-' if chars.peek() == Some(&'-') => {
                    sql.push(c);
                    for c in chars.by_ref() {
                        sql.push(c);
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '@' if chars.peek() == Some(&'@') => {
                    sql.push(c);
                    sql.push('@');
                    chars.next();
                    while let Some(&c) = chars.peek().filter(|c| is_name_char(**c)) {
                        sql.push(c);
                        chars.next();
                    }
                }
                '@' if chars.peek().is_some_and(|c| c.is_alphabetic() || *c == '_') => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek().filter(|c| is_name_char(**c)) {
                        name.push(c);
                        chars.next();
                    }
                    if !sql.is_empty() {
                        segments.push(Segment::Sql(std::mem::take(&mut sql)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                _ => sql.push(c),
            }
        }
        if !sql.is_empty() {
            segments.push(Segment::Sql(sql));
        }
        Self { segments }
    }

    /// Placeholder names in order of appearance, repeats included
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Sql(_) => None,
        })
    }

    /// Bind one record
    ///
    /// Record fields are renamed through the mapping before lookup. A
    /// repeated placeholder reuses its parameter.
    pub fn bind(&self, record: &Record, mapping: &FieldMapping) -> BoundStatement {
        let record = mapping.rename(record);
        let mut sql = String::new();
        let mut names: Vec<&str> = Vec::new();
        let mut values = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Sql(text) => sql.push_str(text),
                Segment::Placeholder(name) => match record.get(name) {
                    Some(value) => {
                        let position = match names.iter().position(|n| *n == name.as_str()) {
                            Some(index) => index + 1,
                            None => {
                                names.push(name.as_str());
                                values.push(SqlValue::from(value));
                                values.len()
                            }
                        };
                        sql.push_str(&format!("@P{}", position));
                    }
                    None => {
                        sql.push('@');
                        sql.push_str(name);
                    }
                },
            }
        }
        BoundStatement { sql, values }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A statement ready to execute: SQL using `@P1..@Pn` plus their values
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl BoundStatement {
    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.values.iter().map(|v| v as &dyn ToSql).collect()
    }
}

/// A scalar bound to a statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(f)) if n.is_f64() => Self::Float(f),
                _ => Self::Text(n.to_string()),
            },
            Value::String(s) => Self::Text(s.clone()),
            // records hold scalars; anything else goes in as its JSON text
            other => Self::Text(other.to_string()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Self::Null => ColumnData::String(None),
            Self::Bool(b) => ColumnData::Bit(Some(*b)),
            Self::Int(i) => ColumnData::I64(Some(*i)),
            Self::Float(f) => ColumnData::F64(Some(*f)),
            Self::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn bind(statement: &str, value: Value) -> BoundStatement {
        InsertTemplate::parse(statement).bind(&record(value), &FieldMapping::default())
    }

    #[test]
    fn test_rewrites_placeholders() {
        let bound = bind(
            "INSERT INTO Items (No, Name, Copy) VALUES (@no, @name, @no)",
            json!({"no": "A1", "name": "Widget"}),
        );
        assert_eq!(
            bound.sql,
            "INSERT INTO Items (No, Name, Copy) VALUES (@P1, @P2, @P1)"
        );
        assert_eq!(
            bound.values,
            vec![
                SqlValue::Text("A1".to_string()),
                SqlValue::Text("Widget".to_string())
            ]
        );
    }

    #[test]
    fn test_system_variables_untouched() {
        let bound = bind(
            "INSERT INTO T (a) VALUES (@a); SELECT @@IDENTITY",
            json!({"a": 1, "IDENTITY": 2}),
        );
        assert_eq!(bound.sql, "INSERT INTO T (a) VALUES (@P1); SELECT @@IDENTITY");
        assert_eq!(bound.values, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_string_literals_untouched() {
        let bound = bind(
            "INSERT INTO T (a, mail, note) VALUES (@a, 'ops@example.com', 'it''s @a')",
            json!({"a": 1, "example": "x"}),
        );
        assert_eq!(
            bound.sql,
            "INSERT INTO T (a, mail, note) VALUES (@P1, 'ops@example.com', 'it''s @a')"
        );
        assert_eq!(bound.values, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_comments_untouched() {
        let bound = bind(
            "-- loads @a rows\nINSERT INTO T (a) VALUES (@a)",
            json!({"a": true}),
        );
        assert_eq!(bound.sql, "-- loads @a rows\nINSERT INTO T (a) VALUES (@P1)");
        assert_eq!(bound.values, vec![SqlValue::Bool(true)]);
    }

    #[test]
    fn test_local_variables_kept() {
        let bound = bind(
            "DECLARE @now datetime2 = SYSDATETIME(); INSERT INTO T (a, at) VALUES (@a, @now)",
            json!({"a": "x"}),
        );
        assert_eq!(
            bound.sql,
            "DECLARE @now datetime2 = SYSDATETIME(); INSERT INTO T (a, at) VALUES (@P1, @now)"
        );
        assert_eq!(bound.values.len(), 1);
    }

    #[test]
    fn test_field_missing_from_record_kept_verbatim() {
        let bound = bind("INSERT INTO T VALUES (@a, @b, @c)", json!({"a": 1, "c": 3}));
        assert_eq!(bound.sql, "INSERT INTO T VALUES (@P1, @b, @P2)");
        assert_eq!(bound.values, vec![SqlValue::Int(1), SqlValue::Int(3)]);
    }

    #[test]
    fn test_values_bound_not_substituted() {
        let bound = bind(
            "INSERT INTO T (name) VALUES (@name)",
            json!({"name": "O'Brien'); DROP TABLE T; --"}),
        );

        assert_eq!(bound.sql, "INSERT INTO T (name) VALUES (@P1)");
        assert_eq!(
            bound.values,
            vec![SqlValue::Text("O'Brien'); DROP TABLE T; --".to_string())]
        );
        assert_eq!(bound.params().len(), 1);
    }

    #[test]
    fn test_values_use_mapping() {
        let template = InsertTemplate::parse("INSERT INTO T VALUES (@ItemNo, @Qty, @Note)");
        let mapping = FieldMapping::new([("no", "ItemNo"), ("quantity", "Qty")]);

        let bound = template.bind(
            &record(json!({"no": "A1", "quantity": 2.5, "Note": null})),
            &mapping,
        );
        assert_eq!(bound.sql, "INSERT INTO T VALUES (@P1, @P2, @P3)");
        assert_eq!(
            bound.values,
            vec![
                SqlValue::Text("A1".to_string()),
                SqlValue::Float(2.5),
                SqlValue::Null
            ]
        );
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        let template = InsertTemplate::parse("INSERT INTO T VALUES (@a, 'x@y', @b, @a, @@ROWCOUNT)");
        assert_eq!(template.placeholders().collect::<Vec<_>>(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_sql_value_conversion() {
        assert_eq!(SqlValue::from(&json!(42)), SqlValue::Int(42));
        assert_eq!(SqlValue::from(&json!(true)), SqlValue::Bool(true));
        assert_eq!(
            SqlValue::from(&json!(u64::MAX)),
            SqlValue::Text(u64::MAX.to_string())
        );
    }
}
