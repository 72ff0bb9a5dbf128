//! SELECT compilation over a normalized [`RequestTree`].
//!
//! Each non-root node becomes one of:
//!
//! - a correlated sub-select packed with `GROUP_CONCAT`, for one-to-many
//!   relations that only contribute fields;
//! - a `NOT EXISTS (...)` condition, for negated relations;
//! - a `LEFT JOIN`, or a `JOIN` when the relation is required.

mod field_format;
mod group_concat;

use oxide_nest_core::{split_direction, SqlValue};

pub use field_format::{field_format, SelectField};
pub use group_concat::group_concat;

use crate::error::{NestError, Result};
use crate::executor::{Query, QueryKind};
use crate::options::NestOptions;
use crate::tree::{unique_alias, NodeId, RequestTree};

/// Compiles a normalized tree into a SELECT with the instance options.
///
/// # Errors
///
/// See [`Compiler::compile`].
pub fn build_select(tree: &mut RequestTree, options: &NestOptions) -> Result<Query> {
    Compiler::new(tree, options.group_concat).compile()
}

/// Statement parts gathered from a node and its joined descendants.
#[derive(Debug, Default)]
struct Parts {
    fields: Vec<SelectField>,
    joins: Vec<String>,
    filter: Vec<String>,
    groupby: Vec<SelectField>,
    orderby: Vec<SelectField>,
    subquery_values: Vec<SqlValue>,
    join_values: Vec<SqlValue>,
    values: Vec<SqlValue>,
    has_many_join: bool,
}

impl Parts {
    fn merge(&mut self, other: Self) {
        self.fields.extend(other.fields);
        self.joins.extend(other.joins);
        self.filter.extend(other.filter);
        self.groupby.extend(other.groupby);
        self.orderby.extend(other.orderby);
        self.subquery_values.extend(other.subquery_values);
        self.join_values.extend(other.join_values);
        self.values.extend(other.values);
        self.has_many_join |= other.has_many_join;
    }
}

/// One compiled (sub-)statement.
#[derive(Debug)]
struct Built {
    sql: String,
    values: Vec<SqlValue>,
    /// Label of the packed column, for sub-selects.
    label: Option<String>,
}

/// Compiles a request tree into one SELECT statement.
///
/// Aliases are allocated in traversal order starting from `a` on every
/// call, so compiling equal trees yields equal statements.
pub struct Compiler<'t> {
    tree: &'t mut RequestTree,
    group_concat: bool,
    alias_count: usize,
}

impl<'t> Compiler<'t> {
    /// Creates a compiler. `group_concat` enables correlated sub-selects
    /// for one-to-many relations.
    pub fn new(tree: &'t mut RequestTree, group_concat: bool) -> Self {
        Self {
            tree,
            group_concat,
            alias_count: 0,
        }
    }

    /// Compiles the tree from its root.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when nothing would be selected or `_group`
    /// is selected without a grouping, and `InvalidReference` for field
    /// expressions that do not parse.
    pub fn compile(mut self) -> Result<Query> {
        let built = self.build_query(NodeId::ROOT)?;
        tracing::debug!(
            verb = "get",
            table = %self.tree.root().sql_table,
            placeholders = built.values.len(),
            "compiled select"
        );
        Ok(Query::new(built.sql, built.values, QueryKind::Select))
    }

    fn next_alias(&mut self) -> String {
        self.alias_count += 1;
        unique_alias(self.alias_count)
    }

    fn build_query(&mut self, id: NodeId) -> Result<Built> {
        self.tree[id].root = true;
        let is_subquery = self.tree[id].is_subquery;

        let mut parts = self.traverse(id, is_subquery)?;

        let node = &mut self.tree[id];
        let alias = node.sql_alias.clone();

        let count_field = format!("{alias}._count");
        let group_field = format!("{alias}._group");
        for field in &mut parts.fields {
            if field.expression == count_field {
                field.expression = String::from("COUNT(*)");
                field.label = Some(String::from("_count"));
                field.agg = true;
            } else if field.expression == group_field {
                let first = parts.groupby.first().ok_or_else(|| {
                    NestError::InvalidRequest("The '_group' field requires a groupby".into())
                })?;
                field.expression.clone_from(&first.expression);
                field.label = Some(String::from("_group"));
            }
        }

        for condition in std::mem::take(&mut node.join) {
            parts.filter.push(condition.render(Some(&alias)));
            parts.values.extend(condition.values);
        }

        let mut values = parts.subquery_values;
        values.append(&mut parts.join_values);
        values.append(&mut parts.values);

        if !is_subquery
            && parts.groupby.is_empty()
            && parts.has_many_join
            && !parts.fields.iter().all(|f| f.agg)
        {
            parts.groupby.push(SelectField {
                expression: format!("{alias}.id"),
                ..SelectField::default()
            });
        }

        let mut label = None;
        let mut sql_fields: Vec<String> = if node.negate && parts.fields.is_empty() {
            vec![String::from("1")]
        } else if is_subquery {
            let address = self.packing_address(id);
            let packed = group_concat(&parts.fields, &address)?;
            label = packed.label;
            vec![packed.expression]
        } else {
            parts
                .fields
                .iter()
                .map(|f| match &f.label {
                    Some(label) => format!("{} AS '{label}'", f.expression),
                    None => f.expression.clone(),
                })
                .collect()
        };

        let mut groupby = label_references(&parts.groupby, &parts.fields);
        let mut orderby = label_references(&parts.orderby, &parts.fields);

        let node = &self.tree[id];
        if node.count_rows {
            let key = if groupby.is_empty() {
                format!("{alias}.id")
            } else {
                groupby.join(", ")
            };
            sql_fields = vec![format!("COUNT(DISTINCT {key}) AS 'count'")];
            groupby.clear();
            orderby.clear();
        }

        if sql_fields.is_empty() {
            return Err(NestError::InvalidRequest("Missing fields".into()));
        }

        let mut sql = format!(
            "SELECT {} FROM {} {alias}",
            sql_fields.join(", "),
            node.sql_table
        );
        for join in &parts.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !parts.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&parts.filter.join(" AND "));
        }
        if !groupby.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&groupby.join(", "));
        }
        if !orderby.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&orderby.join(", "));
        }
        if node.start > 0 {
            sql.push_str(&format!(" LIMIT {},{}", node.start, node.limit));
        } else {
            sql.push_str(&format!(" LIMIT {}", node.limit));
        }

        Ok(Built { sql, values, label })
    }

    /// Address used to label packed fields: the node's own, or for a link
    /// table that of the relation behind it.
    fn packing_address(&self, id: NodeId) -> String {
        let node = &self.tree[id];
        if node.field_alias_path.is_empty() {
            node.children
                .first()
                .map(|child| self.tree[*child].field_alias_path.clone())
                .unwrap_or_default()
        } else {
            node.field_alias_path.clone()
        }
    }

    fn traverse(&mut self, id: NodeId, in_subquery: bool) -> Result<Parts> {
        let mut parts = Parts::default();
        let parent = self.tree[id].parent;

        if parent.is_some() {
            let node = &mut self.tree[id];
            let conditions = node.join.len();
            node.join.retain(|c| c.field != "_required");
            if node.join.len() != conditions {
                node.required_join = true;
            }

            if !node.required_join && !node.has_fields && !node.has_filter {
                return Ok(parts);
            }

            let many = node.many;
            parts.has_many_join = many;

            let ancestors_many = self.tree.ancestors(id).any(|a| self.tree[a].many);
            let node = &self.tree[id];

            if self.group_concat
                && !in_subquery
                && !ancestors_many
                && !node.required_join
                && !node.has_filter
                && many
                && node.groupby.is_empty()
            {
                tracing::trace!(table = %node.name, "relation compiled as packed sub-select");
                self.tree[id].is_subquery = true;
                let built = self.build_query(id)?;
                parts.subquery_values.extend(built.values);
                parts.fields.push(SelectField {
                    expression: format!("({})", built.sql),
                    label: built.label,
                    ..SelectField::default()
                });
                return Ok(parts);
            }

            if node.negate && !in_subquery {
                tracing::trace!(table = %node.name, "relation compiled as NOT EXISTS");
                self.tree[id].is_subquery = true;
                let built = self.build_query(id)?;
                parts.values.extend(built.values);
                parts.filter.push(format!("NOT EXISTS ({})", built.sql));
                return Ok(parts);
            }
        }

        let alias = self.next_alias();
        self.tree[id].sql_alias.clone_from(&alias);

        if let Some(parent) = parent {
            let (parent_alias, parent_locked) = {
                let parent = &self.tree[parent];
                (
                    parent.sql_alias.clone(),
                    parent.required_join || parent.root,
                )
            };
            let node = &mut self.tree[id];

            let mut on = Vec::new();
            for condition in std::mem::take(&mut node.join) {
                on.push(condition.render(Some(&alias)));
                parts.join_values.extend(condition.values);
            }
            for (column, parent_column) in &node.join_conditions {
                on.push(format!("{alias}.{column} = {parent_alias}.{parent_column}"));
            }

            let required = node.required_join;
            node.required_join = required && parent_locked;

            if node.is_subquery {
                parts.filter.extend(on);
                parts.values.append(&mut parts.join_values);
            } else {
                if required && !parent_locked {
                    for (column, parent_column) in &node.join_conditions {
                        parts.filter.push(format!(
                            "({alias}.{column} = {parent_alias}.{parent_column} OR {parent_alias}.{parent_column} IS NULL)"
                        ));
                    }
                }
                let kind = if node.required_join { "JOIN" } else { "LEFT JOIN" };
                tracing::trace!(table = %node.name, kind, "relation compiled as join");
                parts.joins.push(format!(
                    "{kind} {} {alias} ON ({})",
                    node.sql_table,
                    on.join(" AND ")
                ));
            }
        }

        let node = &self.tree[id];
        for condition in &node.filter {
            parts.filter.push(condition.render(Some(&alias)));
            parts.values.extend(condition.values.iter().cloned());
        }

        let path = node.field_alias_path.clone();
        for entry in &node.fields {
            parts.fields.push(match entry {
                crate::tree::FieldEntry::Plain(expression) => {
                    field_format(expression, None, &alias, &path)?
                }
                crate::tree::FieldEntry::Labelled { label, expression } => {
                    field_format(expression, Some(label), &alias, &path)?
                }
            });
        }

        for child in node.children.clone() {
            let child_parts = self.traverse(child, in_subquery)?;
            parts.merge(child_parts);
        }

        let node = &self.tree[id];
        for entry in &node.groupby {
            parts.groupby.push(field_format(entry, None, &alias, &path)?);
        }
        for entry in &node.orderby {
            let (field, direction) = split_direction(entry);
            let mut sort = field_format(field, None, &alias, &path)?;
            sort.direction = direction;
            parts.orderby.push(sort);
        }

        if node.many && !in_subquery && !parts.fields.is_empty() {
            let address = self.packing_address(id);
            let packed = group_concat(&parts.fields, &address)?;
            parts.fields = vec![packed];
        }

        Ok(parts)
    }
}

/// Renders group/order entries, referring to a selected field by its
/// backtick-quoted label when the entry names the same output.
fn label_references(entries: &[SelectField], fields: &[SelectField]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let expression = fields
                .iter()
                .find_map(|field| {
                    let label = field.label.as_ref()?;
                    (entry.label.as_ref() == Some(label) || *label == entry.original)
                        .then(|| format!("`{label}`"))
                })
                .unwrap_or_else(|| entry.expression.clone());
            match entry.direction {
                Some(direction) => format!("{expression} {direction}"),
                None => expression,
            }
        })
        .collect()
}
