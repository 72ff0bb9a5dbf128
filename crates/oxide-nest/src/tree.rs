//! Arena of normalized request nodes.
//!
//! Nodes refer to their parent and children by [`NodeId`]; the normalizer
//! appends nodes and the compiler walks and annotates them in place.

use std::ops::{Index, IndexMut};

use indexmap::IndexMap;
use oxide_nest_core::SqlValue;

use crate::request::Request;
use crate::response::GeneratedField;

/// Index of a node in a [`RequestTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node.
    pub const ROOT: Self = Self(0);
}

/// Returns the table alias for the `index`-th table of a statement,
/// counting from 1: `a` to `z`, then backtick-quoted `aa`, `ab`, ...
#[must_use]
pub fn unique_alias(index: usize) -> String {
    const LETTERS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
    let mut letters = Vec::new();
    let mut i = index;
    while i > 0 {
        i -= 1;
        letters.push(char::from(LETTERS[i % 26]));
        i /= 26;
    }
    let name: String = letters.into_iter().rev().collect();
    if index <= 26 {
        name
    } else {
        format!("`{name}`")
    }
}

/// A compiled filter or join condition. `sql` may contain `$$`, which is
/// replaced with the qualified column; otherwise the column is prepended.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name.
    pub field: String,
    /// SQL comparison template, e.g. `= ?` or `BETWEEN ? AND ?`.
    pub sql: String,
    /// Values bound to the template's placeholders.
    pub values: Vec<SqlValue>,
}

impl Condition {
    /// Renders the condition against a column qualifier (a table alias or
    /// nothing).
    #[must_use]
    pub fn render(&self, qualifier: Option<&str>) -> String {
        let column = match qualifier {
            Some(alias) => format!("{alias}.{}", self.field),
            None => self.field.clone(),
        };
        if self.sql.contains("$$") {
            self.sql.replace("$$", &column)
        } else {
            format!("{column} {}", self.sql)
        }
    }
}

/// A normalized field: a bare expression or a labelled one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEntry {
    /// An expression whose label is derived from its column.
    Plain(String),
    /// An expression with an explicit output label.
    Labelled {
        /// Output label.
        label: String,
        /// Field expression.
        expression: String,
    },
}

/// One table's worth of a normalized request.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Key this node was requested under.
    pub alias: String,
    /// Model name.
    pub name: String,
    /// Physical table.
    pub sql_table: String,
    /// Dotted address of this node, e.g. `post.author.`. Empty at the root
    /// and on intermediate link tables.
    pub field_alias_path: String,
    pub fields: Vec<FieldEntry>,
    pub filter: Vec<Condition>,
    pub join: Vec<Condition>,
    pub groupby: Vec<String>,
    pub orderby: Vec<String>,
    pub limit: u64,
    pub start: u64,
    /// No explicit limit was given; a single object is returned.
    pub single: bool,
    pub count_rows: bool,
    /// Child column to parent column.
    pub join_conditions: IndexMap<String, String>,
    /// One-to-many relation to the parent.
    pub many: bool,
    /// The relation must not exist.
    pub negate: bool,
    /// The join must match.
    pub required_join: bool,
    pub has_filter: bool,
    pub has_fields: bool,

    // Compiler annotations.
    pub root: bool,
    pub is_subquery: bool,
    pub sql_alias: String,
}

/// Normalized request tree plus the state that outlives compilation.
#[derive(Debug, Default)]
pub struct RequestTree {
    nodes: Vec<Node>,
    /// Generated fields to apply after reconstruction.
    pub generated: Vec<GeneratedField>,
    /// The root request after its hook ran.
    pub request: Request,
}

impl RequestTree {
    /// Appends a node, linking it to its parent.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = node.parent;
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Returns the root node.
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Returns true if any node was joined to the root.
    pub fn has_joins(&self) -> bool {
        self.nodes.len() > 1
    }

    /// Iterates over the ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self[id].parent, move |p| self[*p].parent)
    }
}

impl Index<NodeId> for RequestTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for RequestTree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}
