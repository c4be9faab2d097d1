//! Raw schema document as deserialized from YAML (or any serde format).
//!
//! This is the structurally-validated input shape. Names here are still
//! strings; turning them into resolved references is the builder's job.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::model::{ArgMode, ForEach, TriggerWhen, Volatility};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub objects: Vec<DocObject>,
}

/// One declared object. Externally tagged, so a document reads:
///
/// ```yaml
/// objects:
///   - table:
///       schema: public
///       name: users
///       columns: [...]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocObject {
    Schema(SchemaDoc),
    Table(TableDoc),
    EnumType(EnumTypeDoc),
    CompositeType(CompositeTypeDoc),
    Sequence(SequenceDoc),
    Function(FunctionDoc),
    View(ViewDoc),
    Trigger(TriggerDoc),
    Role(RoleDoc),
    Cast(CastDoc),
    Aggregate(AggregateDoc),
    Row(RowDoc),
    Setting(SettingDoc),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDoc {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDoc {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub columns: Vec<ColumnDoc>,
    #[serde(default)]
    pub primary_key: Option<Vec<String>>,
    #[serde(default)]
    pub unique: Vec<UniqueDoc>,
    #[serde(default)]
    pub check: Vec<CheckDoc>,
    #[serde(default)]
    pub exclude: Vec<ExcludeDoc>,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub grants: Vec<GrantDoc>,
    /// Full index definitions, emitted verbatim after the table.
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDoc {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniqueDoc {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckDoc {
    pub expression: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeDoc {
    #[serde(default)]
    pub index_method: Option<String>,
    pub exclusions: Vec<ExclusionDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExclusionDoc {
    pub element: String,
    pub operator: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantDoc {
    pub role: String,
    pub privilege: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignKeyDoc {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    /// Referenced table, `schema.table` or bare (same schema as the table).
    pub references: String,
    pub ref_columns: Vec<String>,
    #[serde(default)]
    pub on_update: Option<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumTypeDoc {
    pub schema: String,
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeTypeDoc {
    pub schema: String,
    pub name: String,
    pub fields: Vec<FieldDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDoc {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceDoc {
    pub schema: String,
    pub name: String,
    #[serde(default = "default_one")]
    pub start_value: i64,
    #[serde(default = "default_one")]
    pub increment: i64,
    #[serde(default)]
    pub minimum_value: Option<i64>,
    #[serde(default)]
    pub maximum_value: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionDoc {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentDoc>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub returns_set: bool,
    pub language: String,
    pub source: String,
    #[serde(default)]
    pub volatility: Volatility,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgumentDoc {
    #[serde(default)]
    pub name: Option<String>,
    pub data_type: String,
    #[serde(default)]
    pub mode: ArgMode,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewDoc {
    pub schema: String,
    pub name: String,
    pub query: String,
    /// Tables/views the query reads from. Declared, never inferred.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerDoc {
    pub name: String,
    pub table: String,
    pub function: String,
    pub when: TriggerWhen,
    pub events: Vec<String>,
    pub for_each: ForEach,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleDoc {
    pub name: String,
    #[serde(default)]
    pub login: bool,
    #[serde(default)]
    pub superuser: bool,
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub createdb: bool,
    #[serde(default)]
    pub createrole: bool,
    #[serde(default)]
    pub memberships: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastDoc {
    pub source: String,
    pub target: String,
    pub function: String,
    #[serde(default)]
    pub implicit: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateDoc {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentDoc>,
    pub sfunc: String,
    pub stype: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowDoc {
    pub table: String,
    /// Column to SQL-literal mapping, insertion order preserved.
    #[serde(deserialize_with = "ordered_pairs")]
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingDoc {
    pub name: String,
    pub value: String,
}

fn default_true() -> bool {
    true
}

fn default_one() -> i64 {
    1
}

/// Deserialize a mapping into a vector of pairs, keeping document order.
fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of column names to literal values")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::new();
            while let Some(entry) = map.next_entry()? {
                pairs.push(entry);
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor)
}
