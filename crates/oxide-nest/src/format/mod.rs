//! Request normalization.
//!
//! Walks a nested request once per node, splitting every `fields`,
//! `filter`, `join`, `groupby` and `orderby` entry into "this table" and
//! "a related table". Related entries accumulate in per-key buckets that
//! become child requests, each joined to its parent by [`join`].

mod conditions;
pub mod datetime;
mod fields;
mod groupby;
pub mod join;
mod limit;
mod orderby;

use indexmap::IndexMap;
use serde_json::{Map, Value};

pub use conditions::ConditionProp;
use conditions::reduce_conditions;
use fields::FieldReducer;
use groupby::reduce_groupby;
use join::{resolve_join, JoinLink, Resolution};
use limit::limit_clause;
use orderby::reduce_orderby;

use crate::error::{NestError, Result};
use crate::options::NestOptions;
use crate::request::Request;
use crate::schema::{resolve_hook, Method, Schema};
use crate::tree::{unique_alias, Node, NodeId, RequestTree};
use crate::validate::table_alias_handler;
use crate::value::display_value;

/// Entries collected for one related table.
#[derive(Debug, Default)]
pub(crate) struct Bucket {
    pub fields: Option<Vec<Value>>,
    pub filter: Option<Map<String, Value>>,
    pub join: Option<Map<String, Value>>,
    pub groupby: Option<Vec<Value>>,
    pub orderby: Option<Vec<Value>>,
}

impl Bucket {
    fn has_filter(&self) -> bool {
        self.filter.is_some() || self.orderby.is_some() || self.groupby.is_some()
    }

    fn has_fields(&self) -> bool {
        self.fields.as_ref().is_some_and(|f| !f.is_empty())
    }

    fn into_request(self, key: &str) -> Request {
        Request {
            table: table_alias_handler(key).to_string(),
            alias: Some(key.to_string()),
            fields: self.fields.map(Value::Array),
            filter: self.filter.map(Value::Object),
            join: self.join.map(Value::Object),
            groupby: self.groupby.map(Value::Array),
            orderby: self.orderby.map(Value::Array),
            ..Request::default()
        }
    }
}

/// Buckets of entries for related tables, keyed as requested
/// (`author`, `-comments`, `tags$2`).
#[derive(Debug, Default)]
pub(crate) struct Joined(IndexMap<String, Bucket>);

impl Joined {
    fn bucket(&mut self, key: &str) -> &mut Bucket {
        self.0.entry(key.to_string()).or_default()
    }

    pub fn extend_fields(&mut self, key: &str, values: Vec<Value>) {
        self.bucket(key).fields.get_or_insert_with(Vec::new).extend(values);
    }

    pub fn extend_groupby(&mut self, key: &str, values: Vec<Value>) {
        self.bucket(key).groupby.get_or_insert_with(Vec::new).extend(values);
    }

    pub fn extend_orderby(&mut self, key: &str, values: Vec<Value>) {
        self.bucket(key).orderby.get_or_insert_with(Vec::new).extend(values);
    }

    pub fn extend_conditions(&mut self, prop: ConditionProp, key: &str, entries: Map<String, Value>) {
        let bucket = self.bucket(key);
        let target = match prop {
            ConditionProp::Filter => &mut bucket.filter,
            ConditionProp::Join => &mut bucket.join,
        };
        target.get_or_insert_with(Map::new).extend(entries);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl IntoIterator for Joined {
    type Item = (String, Bucket);
    type IntoIter = indexmap::map::IntoIter<String, Bucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Splits a comma-separated string, or wraps a lone value, into a list of
/// string entries.
pub(crate) fn to_list(value: &Value) -> Result<Vec<String>> {
    let items = match value {
        Value::String(s) => return Ok(s.split(',').map(|s| s.trim().to_string()).collect()),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(NestError::InvalidReference(format!(
                "The field definition '{}' is invalid.",
                display_value(&other)
            ))),
        })
        .collect()
}

/// Join details carried from a parent to a child request.
#[derive(Debug, Default)]
struct Attachment {
    link: Option<JoinLink>,
    negate: bool,
    has_filter: bool,
    has_fields: bool,
}

/// A request waiting to be normalized.
struct Pending {
    parent: Option<NodeId>,
    request: Request,
    field_alias_path: String,
    attachment: Attachment,
    /// Children fixed before normalization: the real target of a link table.
    preset: Vec<Pending>,
}

/// Normalizes a request into a tree of per-table nodes, running each
/// model's hook for `method` before its node is normalized.
///
/// # Errors
///
/// Returns `InvalidRequest` when a table is missing or `fields` is neither
/// an array nor an object, `InvalidReference` for malformed entries or
/// unresolvable relations, `InvalidLimit`/`InvalidStart` for bad bounds,
/// and any error a hook returns.
pub async fn format_request(
    options: &NestOptions,
    method: Method,
    request: Request,
) -> Result<RequestTree> {
    let mut tree = RequestTree::default();
    let mut link_count = 0;
    let mut stack = vec![Pending {
        parent: None,
        request,
        field_alias_path: String::new(),
        attachment: Attachment::default(),
        preset: Vec::new(),
    }];

    while let Some(pending) = stack.pop() {
        let Pending {
            parent,
            mut request,
            field_alias_path,
            attachment,
            preset,
        } = pending;

        if request.alias.is_none() {
            request.alias = Some(request.table.clone());
        }
        if request.table.is_empty() {
            return Err(NestError::InvalidRequest("`table` option is undefined".into()));
        }

        let name = table_alias_handler(&request.table).to_string();
        let model = options.models.get(&name);
        let sql_table = model
            .and_then(|m| m.table.clone())
            .unwrap_or_else(|| name.clone());

        if let Some(hook) = resolve_hook(&options.models, &name, method) {
            hook.call(&mut request).await?;
        }

        let empty = Schema::new();
        let schema = model.map_or(&empty, |m| &m.schema);
        let alias = request.alias.clone().unwrap_or_default();
        let current_path = if field_alias_path.is_empty() {
            format!("{alias}.")
        } else {
            field_alias_path.clone()
        };

        let mut joined = Joined::default();

        let filter = match &request.filter {
            Some(filter) => {
                reduce_conditions(filter, ConditionProp::Filter, schema, options, &mut joined)?
            }
            None => Vec::new(),
        };

        let fields = match &request.fields {
            Some(fields) => FieldReducer {
                schema,
                field_alias_path: &field_alias_path,
                joined: &mut joined,
                generated: &mut tree.generated,
            }
            .reduce(fields)?,
            None => Vec::new(),
        };

        let join = match &request.join {
            Some(join) => reduce_conditions(join, ConditionProp::Join, schema, options, &mut joined)?,
            None => Vec::new(),
        };

        let groupby = match &request.groupby {
            Some(groupby) => reduce_groupby(groupby, &current_path, &mut joined)?,
            None => Vec::new(),
        };

        let orderby = match &request.orderby {
            Some(orderby) => reduce_orderby(orderby, &current_path, schema, &mut joined)?,
            None => Vec::new(),
        };

        let limits = limit_clause(
            request.limit.as_ref(),
            request.start.as_ref(),
            options.max_limit,
        )?;

        tracing::trace!(
            table = %name,
            alias = %alias,
            path = %field_alias_path,
            related = joined.0.len(),
            "normalized request node"
        );

        let link = attachment.link.unwrap_or_else(|| JoinLink {
            join_conditions: IndexMap::new(),
            many: false,
        });
        let id = tree.push(Node {
            parent,
            alias,
            name: name.clone(),
            sql_table,
            field_alias_path: field_alias_path.clone(),
            fields,
            filter,
            join,
            groupby,
            orderby,
            limit: limits.limit,
            start: limits.start,
            single: limits.single,
            count_rows: request.count_rows,
            join_conditions: link.join_conditions,
            many: link.many,
            negate: attachment.negate,
            has_filter: attachment.has_filter,
            has_fields: attachment.has_fields,
            ..Node::default()
        });

        let mut children = preset;
        for (key, bucket) in joined {
            let has_filter = bucket.has_filter();
            let has_fields = bucket.has_fields();
            let negate = key.starts_with('-');
            let child_path = format!("{field_alias_path}{key}.");
            let child_request = bucket.into_request(&key);

            let resolution = resolve_join(options, &child_request.table, &name)
                .ok_or_else(|| {
                    NestError::InvalidReference(format!("Could not understand field '{key}'"))
                })?;

            children.push(match resolution {
                Resolution::Direct(link) => Pending {
                    parent: None,
                    request: child_request,
                    field_alias_path: child_path,
                    attachment: Attachment {
                        link: Some(link),
                        negate,
                        has_filter,
                        has_fields,
                    },
                    preset: Vec::new(),
                },
                Resolution::Via {
                    table,
                    parent: parent_link,
                    child: child_link,
                } => {
                    link_count += 1;
                    let mut link_request = Request::new(table);
                    link_request.alias = Some(unique_alias(link_count));
                    Pending {
                        parent: None,
                        request: link_request,
                        field_alias_path: String::new(),
                        attachment: Attachment {
                            link: Some(parent_link),
                            negate,
                            has_filter,
                            has_fields,
                        },
                        preset: vec![Pending {
                            parent: None,
                            request: child_request,
                            field_alias_path: child_path,
                            attachment: Attachment {
                                link: Some(child_link),
                                negate: false,
                                has_filter,
                                has_fields,
                            },
                            preset: Vec::new(),
                        }],
                    }
                }
            });
        }

        if parent.is_none() {
            tree.request = request;
        }

        for mut child in children.into_iter().rev() {
            child.parent = Some(id);
            stack.push(child);
        }
    }

    Ok(tree)
}
