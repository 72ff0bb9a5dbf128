//! Join inference between two models.

use indexmap::IndexMap;

use crate::options::NestOptions;
use crate::schema::{Models, Schema};

/// How a child table attaches to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    /// Child column to parent column.
    pub join_conditions: IndexMap<String, String>,
    /// The child references the parent: many children per parent.
    pub many: bool,
}

/// Outcome of resolving a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The two models reference each other directly.
    Direct(JoinLink),
    /// The models are linked through a third model.
    Via {
        /// The intermediate model.
        table: String,
        /// How the intermediate model attaches to the parent.
        parent: JoinLink,
        /// How the child attaches to the intermediate model.
        child: JoinLink,
    },
}

/// Columns of `schema` referencing `target`. Flipped results map the
/// other way round and mark the relation as single.
fn links(schema: Option<&Schema>, target: &str, flipped: bool) -> Option<JoinLink> {
    let mut map = IndexMap::new();
    for (field, attribute) in schema.into_iter().flatten() {
        for reference in attribute.references() {
            let mut parts = reference.split('.');
            if parts.next() == Some(target) {
                let column = parts.next().unwrap_or_default().to_string();
                if flipped {
                    map.insert(column, field.clone());
                } else {
                    map.insert(field.clone(), column);
                }
            }
        }
    }
    (!map.is_empty()).then_some(JoinLink {
        join_conditions: map,
        many: !flipped,
    })
}

/// Resolves a direct link: the child referencing the parent, else the
/// parent referencing the child.
#[must_use]
pub fn resolve_direct(models: &Models, child: &str, parent: &str) -> Option<JoinLink> {
    links(models.get(child).map(|m| &m.schema), parent, false)
        .or_else(|| links(models.get(parent).map(|m| &m.schema), child, true))
}

/// Resolves how `child` joins `parent`, through at most one intermediate
/// model when `infer_intermediate_models` is set.
#[must_use]
pub fn resolve_join(options: &NestOptions, child: &str, parent: &str) -> Option<Resolution> {
    let models = &options.models;
    if let Some(link) = resolve_direct(models, child, parent) {
        tracing::trace!(child, parent, many = link.many, "resolved direct join");
        return Some(Resolution::Direct(link));
    }
    if !options.infer_intermediate_models {
        return None;
    }

    models
        .keys()
        .filter(|name| name.as_str() != child && name.as_str() != parent)
        .find_map(|table| {
            let child_link = resolve_direct(models, child, table)?;
            let parent_link = resolve_direct(models, table, parent)?;
            tracing::trace!(child, parent, via = %table, "resolved join through link table");
            Some(Resolution::Via {
                table: table.clone(),
                parent: parent_link,
                child: child_link,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(models: serde_json::Value) -> NestOptions {
        NestOptions::with_models(serde_json::from_value(models).unwrap())
    }

    fn conditions(link: &JoinLink) -> Vec<(&str, &str)> {
        link.join_conditions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_direct_join_is_symmetric() {
        let options = options(json!({
            "users": {},
            "posts": {"schema": {"user_id": ["users.id"]}}
        }));
        let Some(Resolution::Direct(down)) = resolve_join(&options, "posts", "users") else {
            panic!("expected a direct join");
        };
        let Some(Resolution::Direct(up)) = resolve_join(&options, "users", "posts") else {
            panic!("expected a direct join");
        };
        assert_eq!(conditions(&down), vec![("user_id", "id")]);
        assert!(down.many);
        assert_eq!(conditions(&up), vec![("id", "user_id")]);
        assert!(!up.many);
    }

    #[test]
    fn test_single_link_table() {
        let options = options(json!({
            "users": {},
            "teams": {},
            "memberships": {"schema": {"user_id": ["users.id"], "team_id": ["teams.id"]}}
        }));
        let Some(Resolution::Via {
            table,
            parent,
            child,
        }) = resolve_join(&options, "teams", "users")
        else {
            panic!("expected a link table");
        };
        assert_eq!(table, "memberships");
        assert_eq!(conditions(&parent), vec![("user_id", "id")]);
        assert!(parent.many);
        assert_eq!(conditions(&child), vec![("id", "team_id")]);
        assert!(!child.many);
    }

    #[test]
    fn test_two_hops_are_not_inferred() {
        let options = options(json!({
            "a": {},
            "b": {"schema": {"a_id": ["a.id"]}},
            "c": {"schema": {"b_id": ["b.id"]}},
            "d": {"schema": {"c_id": ["c.id"]}}
        }));
        assert!(matches!(
            resolve_join(&options, "c", "a"),
            Some(Resolution::Via { ref table, .. }) if table == "b"
        ));
        assert_eq!(resolve_join(&options, "d", "a"), None);
    }

    #[test]
    fn test_inference_can_be_disabled() {
        let mut options = options(json!({
            "users": {},
            "teams": {},
            "memberships": {"schema": {"user_id": ["users.id"], "team_id": ["teams.id"]}}
        }));
        options.infer_intermediate_models = false;
        assert_eq!(resolve_join(&options, "teams", "users"), None);
    }
}
