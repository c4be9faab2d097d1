//! Dependency graph over schema objects and the creation ordering.
//!
//! An edge `u -> v` means "u must be created after v". Foreign keys are
//! deliberately absent: they are emitted as separate `ALTER TABLE`
//! statements after every table exists, so mutually referencing tables
//! never form a cycle here.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::model::{DataType, Database, DbObject, ObjRef};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("cyclic dependency between: {}", members.join(", "))]
    CyclicDependency { members: Vec<String> },
}

pub struct DependencyGraph {
    /// prerequisites[u] lists the objects that must exist before object u.
    prerequisites: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn build(db: &Database) -> Self {
        let mut prerequisites: Vec<Vec<usize>> = vec![Vec::new(); db.objects.len()];

        for (index, obj) in db.objects.iter().enumerate() {
            // A self-reference is kept: it surfaces as a one-member cycle.
            let mut add = |r: ObjRef| {
                if !prerequisites[index].contains(&r.0) {
                    prerequisites[index].push(r.0);
                }
            };

            if let Some(schema) = obj.schema() {
                add(schema);
            }

            match obj {
                DbObject::Table(t) => {
                    if let Some(parent) = t.inherits {
                        add(parent);
                    }
                    for column in &t.columns {
                        add_type(&mut add, &column.data_type);
                    }
                }
                DbObject::CompositeType(t) => {
                    for field in &t.fields {
                        add_type(&mut add, &field.data_type);
                    }
                }
                DbObject::Function(f) => {
                    for argument in &f.arguments {
                        add_type(&mut add, &argument.data_type);
                    }
                    if let Some(return_type) = &f.return_type {
                        add_type(&mut add, return_type);
                    }
                }
                DbObject::View(v) => {
                    for &dep in &v.depends_on {
                        add(dep);
                    }
                }
                DbObject::Trigger(t) => {
                    add(t.table);
                    add(t.function);
                }
                DbObject::Cast(c) => {
                    add(c.function);
                    add_type(&mut add, &c.source);
                    add_type(&mut add, &c.target);
                }
                DbObject::Aggregate(a) => {
                    add(a.sfunc);
                    add_type(&mut add, &a.stype);
                }
                DbObject::Role(r) => {
                    for &membership in &r.memberships {
                        add(membership);
                    }
                }
                DbObject::Row(r) => {
                    add(r.table);
                }
                DbObject::Schema(_) | DbObject::EnumType(_) | DbObject::Sequence(_)
                | DbObject::Setting(_) => {}
            }
        }

        let edges: usize = prerequisites.iter().map(Vec::len).sum();
        tracing::debug!(nodes = prerequisites.len(), edges, "dependency graph built");

        Self { prerequisites }
    }

    /// Kahn's algorithm. Among the objects whose prerequisites are all
    /// emitted, the lowest declaration index goes first, so the order is
    /// reproducible run over run.
    pub fn order(&self, db: &Database) -> Result<Vec<ObjRef>, OrderError> {
        let n = self.prerequisites.len();
        let mut remaining: Vec<usize> = self.prerequisites.iter().map(Vec::len).collect();

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (u, prerequisites) in self.prerequisites.iter().enumerate() {
            for &v in prerequisites {
                dependents[v].push(u);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(u, _)| Reverse(u))
            .collect();

        let mut emitted = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(u)) = ready.pop() {
            emitted[u] = true;
            order.push(ObjRef(u));
            for &dependent in &dependents[u] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < n {
            return Err(OrderError::CyclicDependency {
                members: self.extract_cycle(db, &emitted),
            });
        }
        Ok(order)
    }

    /// Walk unemitted prerequisites until a node repeats; the repeated
    /// suffix of the walk is a cycle.
    fn extract_cycle(&self, db: &Database, emitted: &[bool]) -> Vec<String> {
        let start = match emitted.iter().position(|&done| !done) {
            Some(u) => u,
            None => return Vec::new(),
        };

        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            if let Some(first) = path.iter().position(|&u| u == current) {
                return path[first..]
                    .iter()
                    .map(|&u| db.identity(ObjRef(u)))
                    .collect();
            }
            path.push(current);
            // An unemitted node always has an unemitted prerequisite.
            current = match self.prerequisites[current]
                .iter()
                .find(|&&v| !emitted[v])
            {
                Some(&v) => v,
                None => return vec![db.identity(ObjRef(current))],
            };
        }
    }
}

fn add_type(add: &mut impl FnMut(ObjRef), data_type: &DataType) {
    if let DataType::Object(r) = data_type {
        add(*r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::doc::Document;

    fn model(input: &str) -> Database {
        let document: Document = serde_yaml::from_str(input).unwrap();
        build(&document).unwrap()
    }

    fn ordered_identities(db: &Database) -> Vec<String> {
        let order = DependencyGraph::build(db).order(db).unwrap();
        order.iter().map(|&r| db.identity(r)).collect()
    }

    #[test]
    fn test_type_precedes_table_using_it() {
        let db = model(
            r#"
objects:
  - table:
      schema: public
      name: tickets
      columns:
        - name: state
          data_type: status
  - enum_type:
      schema: public
      name: status
      labels: [open, closed]
"#,
        );
        let order = ordered_identities(&db);
        let type_at = order.iter().position(|i| i == "public.status").unwrap();
        let table_at = order.iter().position(|i| i == "public.tickets").unwrap();
        assert!(type_at < table_at);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let db = model(
            r#"
objects:
  - table:
      schema: public
      name: beta
      columns: []
  - table:
      schema: public
      name: alpha
      columns: []
"#,
        );
        let order = ordered_identities(&db);
        assert_eq!(order, vec!["public", "public.beta", "public.alpha"]);
    }

    #[test]
    fn test_composite_type_cycle_is_rejected() {
        let db = model(
            r#"
objects:
  - composite_type:
      schema: public
      name: pair_a
      fields:
        - name: other
          data_type: pair_b
  - composite_type:
      schema: public
      name: pair_b
      fields:
        - name: other
          data_type: pair_a
"#,
        );
        let err = DependencyGraph::build(&db).order(&db).unwrap_err();
        match err {
            OrderError::CyclicDependency { members } => {
                assert!(members.contains(&"public.pair_a".to_string()));
                assert!(members.contains(&"public.pair_b".to_string()));
            }
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let db = model(
            r#"
objects:
  - table:
      schema: public
      name: node
      columns: []
      inherits: node
"#,
        );
        let err = DependencyGraph::build(&db).order(&db).unwrap_err();
        assert_eq!(
            err,
            OrderError::CyclicDependency {
                members: vec!["public.node".to_string()],
            }
        );
    }

    #[test]
    fn test_mutual_foreign_keys_do_not_cycle() {
        let db = model(
            r#"
objects:
  - table:
      schema: public
      name: a
      columns:
        - name: b_id
          data_type: integer
      foreign_keys:
        - columns: [b_id]
          references: b
          ref_columns: [id]
  - table:
      schema: public
      name: b
      columns:
        - name: a_id
          data_type: integer
      foreign_keys:
        - columns: [a_id]
          references: a
          ref_columns: [id]
"#,
        );
        let order = ordered_identities(&db);
        assert_eq!(order, vec!["public", "public.a", "public.b"]);
    }

    #[test]
    fn test_trigger_follows_table_and_function() {
        let db = model(
            r#"
objects:
  - trigger:
      name: users_audit
      table: public.users
      function: audit
      when: before
      events: [insert]
      for_each: row
  - function:
      schema: public
      name: audit
      return_type: trigger
      language: plpgsql
      source: BEGIN RETURN NEW; END;
  - table:
      schema: public
      name: users
      columns: []
"#,
        );
        let order = ordered_identities(&db);
        let trigger_at = order.iter().position(|i| i == "public.users_audit").unwrap();
        let table_at = order.iter().position(|i| i == "public.users").unwrap();
        let function_at = order.iter().position(|i| i == "public.audit").unwrap();
        assert!(table_at < trigger_at);
        assert!(function_at < trigger_at);
    }

    #[test]
    fn test_role_memberships_precede_member() {
        let db = model(
            r#"
objects:
  - role:
      name: app_writer
      memberships: [app_reader]
  - role:
      name: app_reader
"#,
        );
        let order = ordered_identities(&db);
        assert_eq!(order, vec!["app_reader", "app_writer"]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let db = model(
            r#"
objects:
  - table:
      schema: public
      name: one
      columns: []
  - table:
      schema: other
      name: two
      columns: []
  - sequence:
      schema: public
      name: seq
"#,
        );
        assert_eq!(ordered_identities(&db), ordered_identities(&db));
    }
}
