use std::collections::BTreeMap;

use serde::Deserialize;

/// Handle into the [`Database`] object arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub usize);

/// Fully resolved database model. Objects live in `objects` in declaration
/// order; every cross-reference is an [`ObjRef`] into that arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub extensions: Vec<String>,
    pub schemas: BTreeMap<String, ObjRef>,
    pub objects: Vec<DbObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DbObject {
    Schema(SchemaDef),
    Table(Table),
    EnumType(EnumType),
    CompositeType(CompositeType),
    Sequence(Sequence),
    Function(Function),
    View(View),
    Trigger(Trigger),
    Role(Role),
    Cast(Cast),
    Aggregate(Aggregate),
    Row(Row),
    Setting(Setting),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub schema: ObjRef,
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<Column>,
    pub primary_key: Option<Vec<String>>,
    pub unique: Vec<UniqueConstraint>,
    pub check: Vec<CheckConstraint>,
    pub exclude: Vec<ExcludeConstraint>,
    pub inherits: Option<ObjRef>,
    pub owner: Option<ObjRef>,
    pub grants: Vec<Grant>,
    pub indexes: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default: Option<String>,
    pub description: Option<String>,
}

/// A column/field/argument type: either a PostgreSQL base type rendered
/// verbatim, or a user-defined enum/composite type in the arena.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Base(String),
    Object(ObjRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniqueConstraint {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckConstraint {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExcludeConstraint {
    pub index_method: Option<String>,
    pub exclusions: Vec<Exclusion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub element: String,
    pub operator: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub role: ObjRef,
    pub privilege: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub ref_table: ObjRef,
    pub ref_columns: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub schema: ObjRef,
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub schema: ObjRef,
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub schema: ObjRef,
    pub name: String,
    pub start_value: i64,
    pub increment: i64,
    pub minimum_value: Option<i64>,
    pub maximum_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub schema: ObjRef,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub return_type: Option<DataType>,
    pub returns_set: bool,
    pub language: String,
    pub source: String,
    pub volatility: Volatility,
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub data_type: DataType,
    pub mode: ArgMode,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgMode {
    In,
    Out,
    InOut,
    Variadic,
    /// Column of a `RETURNS TABLE(...)` clause, excluded from the signature.
    Table,
}

impl Default for ArgMode {
    fn default() -> Self {
        ArgMode::In
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Volatility {
    Volatile,
    Stable,
    Immutable,
}

impl Default for Volatility {
    fn default() -> Self {
        Volatility::Volatile
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub schema: ObjRef,
    pub name: String,
    pub query: String,
    /// Tables and views this view reads from, declared explicitly in the
    /// input document. Query text is never parsed to infer them.
    pub depends_on: Vec<ObjRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub schema: ObjRef,
    pub name: String,
    pub table: ObjRef,
    pub function: ObjRef,
    pub when: TriggerWhen,
    pub events: Vec<String>,
    pub for_each: ForEach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhen {
    Before,
    After,
    Instead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForEach {
    Row,
    Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub name: String,
    pub login: bool,
    pub superuser: bool,
    pub inherit: bool,
    pub createdb: bool,
    pub createrole: bool,
    pub memberships: Vec<ObjRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    pub source: DataType,
    pub target: DataType,
    pub function: ObjRef,
    pub implicit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub schema: ObjRef,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub sfunc: ObjRef,
    pub stype: DataType,
}

/// Seed data: one row inserted into a table, values kept in declaration
/// order as raw SQL literals.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub table: ObjRef,
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub name: String,
    pub value: String,
}

impl DbObject {
    pub fn kind(&self) -> &'static str {
        match self {
            DbObject::Schema(_) => "schema",
            DbObject::Table(_) => "table",
            DbObject::EnumType(_) => "enum type",
            DbObject::CompositeType(_) => "composite type",
            DbObject::Sequence(_) => "sequence",
            DbObject::Function(_) => "function",
            DbObject::View(_) => "view",
            DbObject::Trigger(_) => "trigger",
            DbObject::Role(_) => "role",
            DbObject::Cast(_) => "cast",
            DbObject::Aggregate(_) => "aggregate",
            DbObject::Row(_) => "row",
            DbObject::Setting(_) => "setting",
        }
    }

    /// Declared name, for objects that have one (casts and rows do not).
    pub fn name(&self) -> Option<&str> {
        match self {
            DbObject::Schema(s) => Some(&s.name),
            DbObject::Table(t) => Some(&t.name),
            DbObject::EnumType(t) => Some(&t.name),
            DbObject::CompositeType(t) => Some(&t.name),
            DbObject::Sequence(s) => Some(&s.name),
            DbObject::Function(f) => Some(&f.name),
            DbObject::View(v) => Some(&v.name),
            DbObject::Trigger(t) => Some(&t.name),
            DbObject::Role(r) => Some(&r.name),
            DbObject::Aggregate(a) => Some(&a.name),
            DbObject::Setting(s) => Some(&s.name),
            DbObject::Cast(_) | DbObject::Row(_) => None,
        }
    }

    /// Owning schema, for objects that have one.
    pub fn schema(&self) -> Option<ObjRef> {
        match self {
            DbObject::Table(t) => Some(t.schema),
            DbObject::EnumType(t) => Some(t.schema),
            DbObject::CompositeType(t) => Some(t.schema),
            DbObject::Sequence(s) => Some(s.schema),
            DbObject::Function(f) => Some(f.schema),
            DbObject::View(v) => Some(v.schema),
            DbObject::Trigger(t) => Some(t.schema),
            DbObject::Aggregate(a) => Some(a.schema),
            DbObject::Schema(_)
            | DbObject::Role(_)
            | DbObject::Cast(_)
            | DbObject::Row(_)
            | DbObject::Setting(_) => None,
        }
    }
}

impl Database {
    pub fn get(&self, r: ObjRef) -> &DbObject {
        &self.objects[r.0]
    }

    /// Schema name of an object reference. References produced by the
    /// builder always point at schema objects; anything else yields "".
    pub fn schema_name(&self, r: ObjRef) -> &str {
        match self.get(r) {
            DbObject::Schema(s) => &s.name,
            _ => "",
        }
    }

    fn qualified(&self, schema: ObjRef, name: &str) -> String {
        format!("{}.{}", self.schema_name(schema), name)
    }

    /// Human-readable identity, used in error reports.
    pub fn identity(&self, r: ObjRef) -> String {
        match self.get(r) {
            DbObject::Schema(s) => s.name.clone(),
            DbObject::Role(role) => role.name.clone(),
            DbObject::Setting(s) => s.name.clone(),
            DbObject::Cast(c) => format!(
                "cast ({} as {})",
                self.type_name(&c.source),
                self.type_name(&c.target)
            ),
            DbObject::Row(row) => format!("row into {}", self.identity(row.table)),
            DbObject::Table(t) => self.qualified(t.schema, &t.name),
            DbObject::EnumType(t) => self.qualified(t.schema, &t.name),
            DbObject::CompositeType(t) => self.qualified(t.schema, &t.name),
            DbObject::Sequence(s) => self.qualified(s.schema, &s.name),
            DbObject::Function(f) => self.qualified(f.schema, &f.name),
            DbObject::View(v) => self.qualified(v.schema, &v.name),
            DbObject::Trigger(t) => self.qualified(t.schema, &t.name),
            DbObject::Aggregate(a) => self.qualified(a.schema, &a.name),
        }
    }

    /// Displayable name of a data type reference.
    pub fn type_name(&self, t: &DataType) -> String {
        match t {
            DataType::Base(name) => name.clone(),
            DataType::Object(r) => self.identity(*r),
        }
    }

    /// Tables belonging to a schema, in declaration order.
    pub fn tables_of(&self, schema: ObjRef) -> impl Iterator<Item = (ObjRef, &Table)> {
        self.objects.iter().enumerate().filter_map(move |(i, obj)| {
            match obj {
                DbObject::Table(t) if t.schema == schema => Some((ObjRef(i), t)),
                _ => None,
            }
        })
    }
}
