//! Builds the resolved object model from a raw document.
//!
//! Two passes: the first lays out the object arena and registers every
//! identity (auto-creating schema objects on first mention), the second
//! constructs fully resolved objects. Forward references are legal, so a
//! foreign key may point at a table declared later in the document.

use std::collections::{HashMap, HashSet};

use crate::doc::{self, DocObject, Document};
use crate::model::{
    Aggregate, Argument, Cast, CheckConstraint, Column, CompositeType, DataType, Database,
    DbObject, EnumType, ExcludeConstraint, Exclusion, Field, ForeignKey, Function, Grant, ObjRef,
    Role, Row, SchemaDef, Sequence, Setting, Table, Trigger, UniqueConstraint, View,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("{referencing} references unknown {kind} '{name}'")]
    UnresolvedReference {
        referencing: String,
        kind: &'static str,
        name: String,
    },
    #[error("duplicate {kind} {identity}")]
    DuplicateIdentity {
        kind: &'static str,
        identity: String,
    },
}

/// PostgreSQL base types accepted without a matching user-defined type.
const BASE_TYPES: &[&str] = &[
    "anyarray",
    "anyelement",
    "bigint",
    "bigserial",
    "bit",
    "bit varying",
    "bool",
    "boolean",
    "box",
    "bytea",
    "char",
    "character",
    "character varying",
    "cidr",
    "circle",
    "date",
    "decimal",
    "double precision",
    "float4",
    "float8",
    "inet",
    "int",
    "int2",
    "int4",
    "int8",
    "integer",
    "interval",
    "json",
    "jsonb",
    "line",
    "lseg",
    "macaddr",
    "macaddr8",
    "money",
    "name",
    "numeric",
    "oid",
    "path",
    "point",
    "polygon",
    "real",
    "record",
    "regclass",
    "regproc",
    "regtype",
    "serial",
    "serial4",
    "serial8",
    "smallint",
    "smallserial",
    "text",
    "time",
    "time with time zone",
    "time without time zone",
    "timestamp",
    "timestamp with time zone",
    "timestamp without time zone",
    "timestamptz",
    "timetz",
    "trigger",
    "tsquery",
    "tsvector",
    "uuid",
    "varchar",
    "void",
    "xml",
];

/// Build a resolved [`Database`] from a deserialized document.
pub fn build(document: &Document) -> Result<Database, BuildError> {
    let mut builder = ModelBuilder::new();
    let slots = builder.layout(document)?;

    let mut objects = Vec::with_capacity(slots.len());
    let mut seen_triggers: HashSet<(String, String)> = HashSet::new();
    for slot in &slots {
        let obj = match slot {
            Slot::ImplicitSchema(name) => DbObject::Schema(SchemaDef { name: name.clone() }),
            Slot::Doc(index) => builder.build_object(&document.objects[*index], &mut seen_triggers)?,
        };
        objects.push(obj);
    }

    let schemas = objects
        .iter()
        .enumerate()
        .filter_map(|(i, obj)| match obj {
            DbObject::Schema(s) => Some((s.name.clone(), ObjRef(i))),
            _ => None,
        })
        .collect();

    tracing::debug!(objects = objects.len(), "built object model");

    Ok(Database {
        extensions: document.extensions.clone(),
        schemas,
        objects,
    })
}

enum Slot {
    /// Schema created on first mention, never declared explicitly.
    ImplicitSchema(String),
    Doc(usize),
}

type IdentityKey = (&'static str, Option<String>, String);

struct ModelBuilder {
    registry: HashMap<IdentityKey, ObjRef>,
}

impl ModelBuilder {
    fn new() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// First pass: assign arena slots and register all identities.
    fn layout(&mut self, document: &Document) -> Result<Vec<Slot>, BuildError> {
        let explicit: HashSet<&str> = document
            .objects
            .iter()
            .filter_map(|obj| match obj {
                DocObject::Schema(s) => Some(s.name.as_str()),
                _ => None,
            })
            .collect();

        let mut slots = Vec::new();
        for (index, obj) in document.objects.iter().enumerate() {
            if let Some(schema) = declared_schema(obj) {
                if !explicit.contains(schema) && self.lookup("schema", None, schema).is_none() {
                    self.register("schema", None, schema, slots.len())?;
                    slots.push(Slot::ImplicitSchema(schema.to_string()));
                }
            }

            let at = slots.len();
            match obj {
                DocObject::Schema(s) => self.register("schema", None, &s.name, at)?,
                DocObject::Table(t) => self.register("table", Some(&t.schema), &t.name, at)?,
                DocObject::EnumType(t) => self.register("type", Some(&t.schema), &t.name, at)?,
                DocObject::CompositeType(t) => {
                    self.register("type", Some(&t.schema), &t.name, at)?
                }
                DocObject::Sequence(s) => self.register("sequence", Some(&s.schema), &s.name, at)?,
                DocObject::Function(f) => self.register("function", Some(&f.schema), &f.name, at)?,
                DocObject::View(v) => self.register("view", Some(&v.schema), &v.name, at)?,
                DocObject::Aggregate(a) => {
                    self.register("aggregate", Some(&a.schema), &a.name, at)?
                }
                DocObject::Role(r) => self.register("role", None, &r.name, at)?,
                DocObject::Setting(s) => self.register("setting", None, &s.name, at)?,
                // Triggers are registered while building (their schema comes
                // from the target table); casts and rows have no identity.
                DocObject::Trigger(_) | DocObject::Cast(_) | DocObject::Row(_) => {}
            }
            slots.push(Slot::Doc(index));
        }
        Ok(slots)
    }

    fn register(
        &mut self,
        kind: &'static str,
        schema: Option<&str>,
        name: &str,
        index: usize,
    ) -> Result<(), BuildError> {
        let key = (kind, schema.map(str::to_string), name.to_string());
        if self.registry.insert(key, ObjRef(index)).is_some() {
            return Err(BuildError::DuplicateIdentity {
                kind,
                identity: match schema {
                    Some(s) => format!("{}.{}", s, name),
                    None => name.to_string(),
                },
            });
        }
        Ok(())
    }

    fn lookup(&self, kind: &'static str, schema: Option<&str>, name: &str) -> Option<ObjRef> {
        let key = (kind, schema.map(str::to_string), name.to_string());
        self.registry.get(&key).copied()
    }

    fn build_object(
        &self,
        obj: &DocObject,
        seen_triggers: &mut HashSet<(String, String)>,
    ) -> Result<DbObject, BuildError> {
        match obj {
            DocObject::Schema(s) => Ok(DbObject::Schema(SchemaDef {
                name: s.name.clone(),
            })),
            DocObject::Table(t) => self.build_table(t),
            DocObject::EnumType(t) => {
                let referencing = format!("enum type {}.{}", t.schema, t.name);
                Ok(DbObject::EnumType(EnumType {
                    schema: self.schema_ref(&t.schema, &referencing)?,
                    name: t.name.clone(),
                    labels: t.labels.clone(),
                }))
            }
            DocObject::CompositeType(t) => self.build_composite_type(t),
            DocObject::Sequence(s) => {
                let referencing = format!("sequence {}.{}", s.schema, s.name);
                Ok(DbObject::Sequence(Sequence {
                    schema: self.schema_ref(&s.schema, &referencing)?,
                    name: s.name.clone(),
                    start_value: s.start_value,
                    increment: s.increment,
                    minimum_value: s.minimum_value,
                    maximum_value: s.maximum_value,
                }))
            }
            DocObject::Function(f) => self.build_function(f),
            DocObject::View(v) => self.build_view(v),
            DocObject::Trigger(t) => self.build_trigger(t, seen_triggers),
            DocObject::Role(r) => self.build_role(r),
            DocObject::Cast(c) => self.build_cast(c),
            DocObject::Aggregate(a) => self.build_aggregate(a),
            DocObject::Row(r) => self.build_row(r),
            DocObject::Setting(s) => Ok(DbObject::Setting(Setting {
                name: s.name.clone(),
                value: s.value.clone(),
            })),
        }
    }

    fn build_table(&self, t: &doc::TableDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("table {}.{}", t.schema, t.name);

        let columns = t
            .columns
            .iter()
            .map(|c| {
                Ok(Column {
                    name: c.name.clone(),
                    data_type: self.resolve_type(Some(&t.schema), &referencing, &c.data_type)?,
                    nullable: c.nullable,
                    default: c.default.clone(),
                    description: c.description.clone(),
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let foreign_keys = t
            .foreign_keys
            .iter()
            .map(|fk| {
                Ok(ForeignKey {
                    name: fk.name.clone(),
                    columns: fk.columns.clone(),
                    ref_table: self.resolve(
                        "table",
                        Some(&t.schema),
                        &referencing,
                        &fk.references,
                    )?,
                    ref_columns: fk.ref_columns.clone(),
                    on_update: fk.on_update.clone(),
                    on_delete: fk.on_delete.clone(),
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let grants = t
            .grants
            .iter()
            .map(|g| {
                Ok(Grant {
                    role: self.resolve_role(&referencing, &g.role)?,
                    privilege: g.privilege.clone(),
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        Ok(DbObject::Table(Table {
            schema: self.schema_ref(&t.schema, &referencing)?,
            name: t.name.clone(),
            description: t.description.clone(),
            columns,
            primary_key: t.primary_key.clone(),
            unique: t
                .unique
                .iter()
                .map(|u| UniqueConstraint {
                    columns: u.columns.clone(),
                })
                .collect(),
            check: t
                .check
                .iter()
                .map(|c| CheckConstraint {
                    expression: c.expression.clone(),
                })
                .collect(),
            exclude: t
                .exclude
                .iter()
                .map(|e| ExcludeConstraint {
                    index_method: e.index_method.clone(),
                    exclusions: e
                        .exclusions
                        .iter()
                        .map(|x| Exclusion {
                            element: x.element.clone(),
                            operator: x.operator.clone(),
                        })
                        .collect(),
                })
                .collect(),
            inherits: t
                .inherits
                .as_deref()
                .map(|raw| self.resolve("table", Some(&t.schema), &referencing, raw))
                .transpose()?,
            owner: t
                .owner
                .as_deref()
                .map(|role| self.resolve_role(&referencing, role))
                .transpose()?,
            grants,
            indexes: t.indexes.clone(),
            foreign_keys,
        }))
    }

    fn build_composite_type(&self, t: &doc::CompositeTypeDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("composite type {}.{}", t.schema, t.name);
        let fields = t
            .fields
            .iter()
            .map(|f| {
                Ok(Field {
                    name: f.name.clone(),
                    data_type: self.resolve_type(Some(&t.schema), &referencing, &f.data_type)?,
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;
        Ok(DbObject::CompositeType(CompositeType {
            schema: self.schema_ref(&t.schema, &referencing)?,
            name: t.name.clone(),
            fields,
        }))
    }

    fn build_function(&self, f: &doc::FunctionDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("function {}.{}", f.schema, f.name);
        let arguments = self.build_arguments(&f.arguments, &f.schema, &referencing)?;
        let return_type = f
            .return_type
            .as_deref()
            .map(|raw| self.resolve_type(Some(&f.schema), &referencing, raw))
            .transpose()?;
        Ok(DbObject::Function(Function {
            schema: self.schema_ref(&f.schema, &referencing)?,
            name: f.name.clone(),
            arguments,
            return_type,
            returns_set: f.returns_set,
            language: f.language.clone(),
            source: f.source.clone(),
            volatility: f.volatility,
            strict: f.strict,
        }))
    }

    fn build_arguments(
        &self,
        arguments: &[doc::ArgumentDoc],
        schema: &str,
        referencing: &str,
    ) -> Result<Vec<Argument>, BuildError> {
        arguments
            .iter()
            .map(|a| {
                Ok(Argument {
                    name: a.name.clone(),
                    data_type: self.resolve_type(Some(schema), referencing, &a.data_type)?,
                    mode: a.mode,
                    default: a.default.clone(),
                })
            })
            .collect()
    }

    fn build_view(&self, v: &doc::ViewDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("view {}.{}", v.schema, v.name);
        let depends_on = v
            .depends_on
            .iter()
            .map(|raw| self.resolve_relation(Some(&v.schema), &referencing, raw))
            .collect::<Result<Vec<_>, BuildError>>()?;
        Ok(DbObject::View(View {
            schema: self.schema_ref(&v.schema, &referencing)?,
            name: v.name.clone(),
            query: v.query.clone(),
            depends_on,
        }))
    }

    fn build_trigger(
        &self,
        t: &doc::TriggerDoc,
        seen: &mut HashSet<(String, String)>,
    ) -> Result<DbObject, BuildError> {
        let referencing = format!("trigger {}", t.name);
        let table = self.resolve_relation(None, &referencing, &t.table)?;
        // The trigger lives in its table's schema.
        let (schema_name, _) = split_ref(&t.table, None);
        let schema = self.schema_ref(&schema_name, &referencing)?;
        if !seen.insert((schema_name.clone(), t.name.clone())) {
            return Err(BuildError::DuplicateIdentity {
                kind: "trigger",
                identity: format!("{}.{}", schema_name, t.name),
            });
        }
        let function = self.resolve("function", Some(&schema_name), &referencing, &t.function)?;
        Ok(DbObject::Trigger(Trigger {
            schema,
            name: t.name.clone(),
            table,
            function,
            when: t.when,
            events: t.events.clone(),
            for_each: t.for_each,
        }))
    }

    fn build_role(&self, r: &doc::RoleDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("role {}", r.name);
        let memberships = r
            .memberships
            .iter()
            .map(|name| self.resolve_role(&referencing, name))
            .collect::<Result<Vec<_>, BuildError>>()?;
        Ok(DbObject::Role(Role {
            name: r.name.clone(),
            login: r.login,
            superuser: r.superuser,
            inherit: r.inherit,
            createdb: r.createdb,
            createrole: r.createrole,
            memberships,
        }))
    }

    fn build_cast(&self, c: &doc::CastDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("cast ({} as {})", c.source, c.target);
        Ok(DbObject::Cast(Cast {
            source: self.resolve_type(None, &referencing, &c.source)?,
            target: self.resolve_type(None, &referencing, &c.target)?,
            function: self.resolve("function", None, &referencing, &c.function)?,
            implicit: c.implicit,
        }))
    }

    fn build_aggregate(&self, a: &doc::AggregateDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("aggregate {}.{}", a.schema, a.name);
        Ok(DbObject::Aggregate(Aggregate {
            schema: self.schema_ref(&a.schema, &referencing)?,
            name: a.name.clone(),
            arguments: self.build_arguments(&a.arguments, &a.schema, &referencing)?,
            sfunc: self.resolve("function", Some(&a.schema), &referencing, &a.sfunc)?,
            stype: self.resolve_type(Some(&a.schema), &referencing, &a.stype)?,
        }))
    }

    fn build_row(&self, r: &doc::RowDoc) -> Result<DbObject, BuildError> {
        let referencing = format!("row into {}", r.table);
        Ok(DbObject::Row(Row {
            table: self.resolve("table", None, &referencing, &r.table)?,
            values: r.values.clone(),
        }))
    }

    fn schema_ref(&self, name: &str, referencing: &str) -> Result<ObjRef, BuildError> {
        self.lookup("schema", None, name)
            .ok_or_else(|| BuildError::UnresolvedReference {
                referencing: referencing.to_string(),
                kind: "schema",
                name: name.to_string(),
            })
    }

    fn resolve_role(&self, referencing: &str, name: &str) -> Result<ObjRef, BuildError> {
        self.lookup("role", None, name)
            .ok_or_else(|| BuildError::UnresolvedReference {
                referencing: referencing.to_string(),
                kind: "role",
                name: name.to_string(),
            })
    }

    /// Resolve a possibly schema-qualified reference within one namespace.
    fn resolve(
        &self,
        kind: &'static str,
        context_schema: Option<&str>,
        referencing: &str,
        raw: &str,
    ) -> Result<ObjRef, BuildError> {
        let (schema, name) = split_ref(raw, context_schema);
        self.lookup(kind, Some(&schema), name)
            .ok_or_else(|| BuildError::UnresolvedReference {
                referencing: referencing.to_string(),
                kind,
                name: raw.to_string(),
            })
    }

    /// Resolve a reference that may name either a table or a view.
    fn resolve_relation(
        &self,
        context_schema: Option<&str>,
        referencing: &str,
        raw: &str,
    ) -> Result<ObjRef, BuildError> {
        let (schema, name) = split_ref(raw, context_schema);
        self.lookup("table", Some(&schema), name)
            .or_else(|| self.lookup("view", Some(&schema), name))
            .ok_or_else(|| BuildError::UnresolvedReference {
                referencing: referencing.to_string(),
                kind: "table",
                name: raw.to_string(),
            })
    }

    /// Resolve a data type string: user-defined types win, otherwise the
    /// name must be a recognized PostgreSQL base type.
    fn resolve_type(
        &self,
        context_schema: Option<&str>,
        referencing: &str,
        raw: &str,
    ) -> Result<DataType, BuildError> {
        let (schema, name) = split_ref(raw, context_schema);
        if let Some(r) = self.lookup("type", Some(&schema), name) {
            return Ok(DataType::Object(r));
        }
        if is_base_type(raw) {
            return Ok(DataType::Base(raw.to_string()));
        }
        Err(BuildError::UnresolvedReference {
            referencing: referencing.to_string(),
            kind: "type",
            name: raw.to_string(),
        })
    }
}

/// Schema declared on the object itself, if the kind has one.
fn declared_schema(obj: &DocObject) -> Option<&str> {
    match obj {
        DocObject::Table(t) => Some(&t.schema),
        DocObject::EnumType(t) => Some(&t.schema),
        DocObject::CompositeType(t) => Some(&t.schema),
        DocObject::Sequence(s) => Some(&s.schema),
        DocObject::Function(f) => Some(&f.schema),
        DocObject::View(v) => Some(&v.schema),
        DocObject::Aggregate(a) => Some(&a.schema),
        DocObject::Schema(_)
        | DocObject::Trigger(_)
        | DocObject::Role(_)
        | DocObject::Cast(_)
        | DocObject::Row(_)
        | DocObject::Setting(_) => None,
    }
}

/// Split `schema.name`; bare names fall back to the referencing object's
/// schema, or `public` where there is none.
fn split_ref<'a>(raw: &'a str, context_schema: Option<&str>) -> (String, &'a str) {
    match raw.split_once('.') {
        Some((schema, name)) => (schema.to_string(), name),
        None => (context_schema.unwrap_or("public").to_string(), raw),
    }
}

/// Recognize a PostgreSQL base type, ignoring size parameters and array
/// brackets: `character varying(100)`, `numeric(8,2)`, `integer[]`.
fn is_base_type(raw: &str) -> bool {
    let mut name = raw.to_ascii_lowercase();
    if let (Some(open), Some(close)) = (name.find('('), name.rfind(')')) {
        if open < close {
            name = format!("{}{}", &name[..open], &name[close + 1..]);
        }
    }
    let name = name.trim_end_matches("[]");
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    BASE_TYPES.contains(&name.as_str())
}
