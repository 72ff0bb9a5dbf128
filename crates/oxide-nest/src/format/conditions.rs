//! Filter and join condition builder.

use oxide_nest_core::SqlValue;
use serde_json::{Map, Value};

use super::Joined;
use crate::error::{NestError, Result};
use crate::format::datetime::format_datetime;
use crate::options::NestOptions;
use crate::schema::{FieldAttribute, FieldType, Schema};
use crate::tree::Condition;
use crate::validate::{validate_alias, validate_field};
use crate::value::{display_value, is_truthy, to_sql_value};

/// Which request property a set of conditions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionProp {
    Filter,
    Join,
}

impl ConditionProp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Join => "join",
        }
    }
}

/// Key decorations: `-` negates, `%` forces LIKE, `~` forces a range.
#[derive(Debug, Clone, Copy, Default)]
struct Operators {
    negate: bool,
    like: bool,
    range: bool,
}

impl Operators {
    fn strip(key: &str) -> (Self, &str) {
        let rest = key.trim_start_matches(['-', '%', '~']);
        let decorations = &key[..key.len() - rest.len()];
        let operators = Self {
            negate: decorations.contains('-'),
            like: decorations.contains('%'),
            range: decorations.contains('~'),
        };
        (operators, rest)
    }
}

/// Compiles a filter or join map into local conditions. Entries that
/// address a related table are handed to `joined`.
pub(crate) fn reduce_conditions(
    conditions: &Value,
    prop: ConditionProp,
    schema: &Schema,
    options: &NestOptions,
    joined: &mut Joined,
) -> Result<Vec<Condition>> {
    let Value::Object(entries) = conditions else {
        return Err(NestError::InvalidReference(format!(
            "The {} '{}' is invalid.",
            prop.as_str(),
            display_value(conditions)
        )));
    };

    let mut out = Vec::new();
    for (key, value) in entries {
        let (raw_key, sub_key) = match key.split_once('.') {
            Some((raw, sub)) => (raw, Some(sub)),
            None => (key.as_str(), None),
        };
        let (operators, root_key) = Operators::strip(raw_key);

        let value = match sub_key {
            Some(sub) => {
                let mut nested = Map::new();
                nested.insert(sub.to_string(), value.clone());
                Value::Object(nested)
            }
            None => value.clone(),
        };

        if let Value::Object(nested) = value {
            validate_alias(root_key)?;
            joined.extend_conditions(prop, raw_key, nested);
            continue;
        }

        let field = validate_field(root_key)?;
        let attribute = schema.get(&field);
        out.push(prep_condition(field, value, attribute, operators, options));
    }
    Ok(out)
}

fn prep_condition(
    field: String,
    value: Value,
    attribute: Option<&FieldAttribute>,
    operators: Operators,
    options: &NestOptions,
) -> Condition {
    let field = attribute
        .and_then(FieldAttribute::alias)
        .map_or(field, String::from);
    let (sql, values) = compile_value(value, attribute, operators, options);
    Condition { field, sql, values }
}

fn compile_value(
    value: Value,
    attribute: Option<&FieldAttribute>,
    operators: Operators,
    options: &NestOptions,
) -> (String, Vec<SqlValue>) {
    let value = match attribute.and_then(FieldAttribute::field_type) {
        Some(FieldType::Datetime) => format_datetime(&value),
        _ => value,
    };
    let negate = operators.negate;
    let allow_like = options.allows_operator('%');

    if options.allows_operator('~') || operators.range {
        if let Some(bounds) = range_bounds(&value, operators.range) {
            return compile_range(&bounds, negate);
        }
    }

    match value {
        Value::String(text) if options.allows_operator('!') && text.starts_with('!') => {
            ("NOT LIKE ?".into(), vec![SqlValue::Text(text[1..].to_string())])
        }
        Value::String(text) if operators.like || (allow_like && text.contains('%')) => {
            let sql = if negate { "NOT LIKE ?" } else { "LIKE ?" };
            (sql.into(), vec![SqlValue::Text(text)])
        }
        Value::Null => {
            let sql = if negate { "IS NOT NULL" } else { "IS NULL" };
            (sql.into(), Vec::new())
        }
        Value::Array(items) if items.is_empty() => (format!("AND {negate}"), Vec::new()),
        Value::Array(items) => {
            let (grouped, others): (Vec<Value>, Vec<Value>) =
                items.into_iter().partition(|item| match item {
                    Value::Null => false,
                    Value::String(s) => !(allow_like && s.contains('%')),
                    _ => true,
                });

            let mut conditions = Vec::new();
            let mut values: Vec<SqlValue> = grouped.iter().map(to_sql_value).collect();
            if !grouped.is_empty() {
                let placeholders = vec!["?"; grouped.len()].join(",");
                let not = if negate { "NOT " } else { "" };
                conditions.push(format!("{not}IN ({placeholders})"));
            }
            for item in others {
                let (sql, item_values) = compile_value(item, attribute, operators, options);
                conditions.push(sql);
                values.extend(item_values);
            }

            if conditions.len() == 1 {
                (conditions.remove(0), values)
            } else {
                let glue = if negate { " AND " } else { " OR " };
                let joined = conditions
                    .iter()
                    .map(|c| {
                        if c.contains("$$") {
                            c.clone()
                        } else {
                            format!("$$ {c}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(glue);
                (format!("({joined})"), values)
            }
        }
        other => {
            let sql = if negate { "!= ?" } else { "= ?" };
            (sql.into(), vec![to_sql_value(&other)])
        }
    }
}

/// Splits `a..b`, or a two-item array under the range operator.
fn range_bounds(value: &Value, range_operator: bool) -> Option<[Value; 2]> {
    match value {
        Value::String(text) => {
            let mut parts = text.split("..");
            match (parts.next(), parts.next(), parts.next()) {
                (Some(from), Some(to), None) => Some([from.into(), to.into()]),
                _ => None,
            }
        }
        Value::Array(items) if range_operator && items.len() == 2 => {
            Some([items[0].clone(), items[1].clone()])
        }
        _ => None,
    }
}

fn compile_range(bounds: &[Value; 2], negate: bool) -> (String, Vec<SqlValue>) {
    let [from, to] = bounds;
    let (sql, values) = match (is_truthy(from), is_truthy(to)) {
        (true, true) => (
            "BETWEEN ? AND ?",
            vec![to_sql_value(from), to_sql_value(to)],
        ),
        (true, false) => ("$$ > ?", vec![to_sql_value(from)]),
        _ => ("$$ < ?", vec![to_sql_value(to)]),
    };
    if negate {
        let column = if sql.starts_with("$$") { "" } else { "$$ " };
        (format!("(NOT {column}{sql} OR $$ IS NULL)"), values)
    } else {
        (sql.to_string(), values)
    }
}
