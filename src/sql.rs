//! SQL DDL rendering: per-kind statement emission, deferred foreign keys
//! and assembly of the final statement sequence.

use crate::graph::{DependencyGraph, OrderError};
use crate::model::{
    Aggregate, ArgMode, Argument, Cast, Column, CompositeType, DataType, Database, DbObject,
    EnumType, ExcludeConstraint, ForEach, ForeignKey, Function, ObjRef, Role, Row, SchemaDef,
    Sequence, Setting, Table, Trigger, TriggerWhen, View, Volatility,
};

pub struct SqlRenderer {
    /// Idempotent mode: add `IF NOT EXISTS` guards to `CREATE SCHEMA`,
    /// `CREATE EXTENSION` and `CREATE TABLE`.
    pub if_not_exists: bool,
}

impl Default for SqlRenderer {
    fn default() -> Self {
        Self {
            if_not_exists: false,
        }
    }
}

impl SqlRenderer {
    /// Render the complete statement sequence: extensions, settings, the
    /// dependency-ordered object statements, then deferred foreign keys.
    /// Fails without emitting anything if the dependency graph has a cycle.
    pub fn render(&self, db: &Database) -> Result<Vec<String>, OrderError> {
        let order = DependencyGraph::build(db).order(db)?;

        let mut statements: Vec<String> = Vec::new();

        for extension in &db.extensions {
            statements.push(format!(
                "CREATE EXTENSION {}{};",
                self.if_not_exists_clause(),
                quote_ident(extension)
            ));
        }

        // Settings lead unconditionally, in declaration order.
        for obj in &db.objects {
            if let DbObject::Setting(setting) = obj {
                statements.extend(render_setting(setting));
            }
        }

        for &r in &order {
            if matches!(db.get(r), DbObject::Setting(_)) {
                continue;
            }
            statements.extend(self.render_object(db, r));
        }

        // Foreign keys strictly after every CREATE TABLE, so mutually
        // referencing tables need no ordering between themselves.
        for &schema in db.schemas.values() {
            for (_, table) in db.tables_of(schema) {
                for (index, fk) in table.foreign_keys.iter().enumerate() {
                    statements.push(render_foreign_key(db, table, index, fk));
                }
            }
        }

        tracing::debug!(statements = statements.len(), "rendered statement sequence");

        Ok(statements)
    }

    /// Full script text: statement blocks separated by blank lines.
    pub fn render_to_string(&self, db: &Database) -> Result<String, OrderError> {
        Ok(format!("{}\n", self.render(db)?.join("\n\n")))
    }

    /// Statements defining a single object.
    pub fn render_object(&self, db: &Database, r: ObjRef) -> Vec<String> {
        match db.get(r) {
            DbObject::Schema(s) => vec![self.render_schema(s)],
            DbObject::Table(t) => self.render_table(db, t),
            DbObject::EnumType(t) => vec![render_enum_type(db, t)],
            DbObject::CompositeType(t) => vec![render_composite_type(db, t)],
            DbObject::Sequence(s) => vec![render_sequence(db, s)],
            DbObject::Function(f) => vec![render_function(db, f)],
            DbObject::View(v) => vec![render_view(db, v)],
            DbObject::Trigger(t) => vec![render_trigger(db, t)],
            DbObject::Role(role) => render_role(db, role),
            DbObject::Cast(c) => vec![render_cast(db, c)],
            DbObject::Aggregate(a) => vec![render_aggregate(db, a)],
            DbObject::Row(row) => vec![render_row(db, row)],
            DbObject::Setting(s) => render_setting(s),
        }
    }

    fn render_schema(&self, schema: &SchemaDef) -> String {
        format!(
            "CREATE SCHEMA {}{};",
            self.if_not_exists_clause(),
            quote_ident(&schema.name)
        )
    }

    fn render_table(&self, db: &Database, table: &Table) -> Vec<String> {
        let ident = format!(
            "{}.{}",
            quote_ident(db.schema_name(table.schema)),
            quote_ident(&table.name)
        );

        let mut components: Vec<String> = Vec::new();
        for column in &table.columns {
            components.push(format!("  {}", render_column(db, column)));
        }
        if let Some(primary_key) = &table.primary_key {
            components.push(format!("  PRIMARY KEY ({})", primary_key.join(", ")));
        }
        for unique in &table.unique {
            components.push(format!("  UNIQUE ({})", unique.columns.join(", ")));
        }
        for check in &table.check {
            components.push(format!("  CHECK ({})", check.expression));
        }
        for exclude in &table.exclude {
            components.push(format!("  {}", render_exclude(exclude)));
        }

        let inherits = match table.inherits {
            Some(parent) => format!(" INHERITS ({})", qualified_ident(db, parent)),
            None => String::new(),
        };

        let mut statements = vec![format!(
            "CREATE TABLE {}{}\n(\n{}\n){};",
            self.if_not_exists_clause(),
            ident,
            components.join(",\n"),
            inherits
        )];

        if let Some(description) = &table.description {
            statements.push(format!(
                "COMMENT ON TABLE {} IS {};",
                ident,
                quote_string(&escape_string(description))
            ));
        }
        for index in &table.indexes {
            statements.push(format!("{};", index));
        }
        if let Some(owner) = table.owner {
            statements.push(format!(
                "ALTER TABLE {} OWNER TO {};",
                ident,
                role_name(db, owner)
            ));
        }
        for grant in &table.grants {
            statements.push(format!(
                "GRANT {} ON TABLE {} TO {};",
                grant.privilege,
                ident,
                role_name(db, grant.role)
            ));
        }
        statements
    }

    fn if_not_exists_clause(&self) -> &'static str {
        if self.if_not_exists { "IF NOT EXISTS " } else { "" }
    }
}

fn render_setting(setting: &Setting) -> Vec<String> {
    vec![
        format!(
            "DO $$ BEGIN\nEXECUTE 'ALTER DATABASE ' || current_database() || ' SET {} TO {}';\nEND; $$;",
            setting.name, setting.value
        ),
        format!("SET {} TO {};", setting.name, setting.value),
    ]
}

fn render_column(db: &Database, column: &Column) -> String {
    let mut parts = vec![quote_ident(&column.name), type_sql(db, &column.data_type)];
    if !column.nullable {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", default));
    }
    parts.join(" ")
}

fn render_exclude(exclude: &ExcludeConstraint) -> String {
    let mut out = String::from("EXCLUDE ");
    if let Some(method) = &exclude.index_method {
        out.push_str(&format!("USING {} ", method));
    }
    let elements: Vec<String> = exclude
        .exclusions
        .iter()
        .map(|e| format!("{} WITH {}", e.element, e.operator))
        .collect();
    out.push_str(&format!("({})", elements.join(", ")));
    out
}

fn render_enum_type(db: &Database, enum_type: &EnumType) -> String {
    let labels: Vec<String> = enum_type
        .labels
        .iter()
        .map(|label| format!("  {}", quote_string(&escape_string(label))))
        .collect();
    format!(
        "CREATE TYPE {}.{} AS ENUM (\n{}\n);",
        quote_ident(db.schema_name(enum_type.schema)),
        quote_ident(&enum_type.name),
        labels.join(",\n")
    )
}

fn render_composite_type(db: &Database, composite: &CompositeType) -> String {
    let fields: Vec<String> = composite
        .fields
        .iter()
        .map(|f| format!("  {} {}", quote_ident(&f.name), type_sql(db, &f.data_type)))
        .collect();
    format!(
        "CREATE TYPE {}.{} AS (\n{}\n);",
        quote_ident(db.schema_name(composite.schema)),
        quote_ident(&composite.name),
        fields.join(",\n")
    )
}

fn render_sequence(db: &Database, sequence: &Sequence) -> String {
    let minimum = match sequence.minimum_value {
        Some(value) => format!("MINVALUE {}", value),
        None => "NO MINVALUE".to_string(),
    };
    let maximum = match sequence.maximum_value {
        Some(value) => format!("MAXVALUE {}", value),
        None => "NO MAXVALUE".to_string(),
    };
    format!(
        "CREATE SEQUENCE {}.{}\nSTART WITH {}\nINCREMENT BY {}\n{}\n{}\nCACHE 1;",
        db.schema_name(sequence.schema),
        sequence.name,
        sequence.start_value,
        sequence.increment,
        minimum,
        maximum
    )
}

fn render_function(db: &Database, function: &Function) -> String {
    let signature: Vec<String> = function
        .arguments
        .iter()
        .filter(|a| a.mode != ArgMode::Table)
        .map(|a| render_argument(db, a))
        .collect();

    let table_columns: Vec<String> = function
        .arguments
        .iter()
        .filter(|a| a.mode == ArgMode::Table)
        .map(|a| render_argument(db, a))
        .collect();

    let returns = if !table_columns.is_empty() {
        format!("TABLE({})", table_columns.join(", "))
    } else {
        let set = if function.returns_set { "SETOF " } else { "" };
        let return_type = match &function.return_type {
            Some(t) => type_sql(db, t),
            None => "void".to_string(),
        };
        format!("{}{}", set, return_type)
    };

    // Switch to a named quote tag when the body itself contains `$$`.
    let tag = if function.source.contains("$$") {
        "$function$"
    } else {
        "$$"
    };
    let strict = if function.strict { " STRICT" } else { "" };

    format!(
        "CREATE FUNCTION {}.{}({})\n    RETURNS {}\nAS {}\n{}\n{} LANGUAGE {} {}{};",
        quote_ident(db.schema_name(function.schema)),
        quote_ident(&function.name),
        signature.join(", "),
        returns,
        tag,
        function.source,
        tag,
        function.language,
        volatility_sql(function.volatility),
        strict
    )
}

fn render_argument(db: &Database, argument: &Argument) -> String {
    match &argument.name {
        None => type_sql(db, &argument.data_type),
        Some(name) => {
            let default = match &argument.default {
                Some(value) => format!(" DEFAULT {}", value),
                None => String::new(),
            };
            format!(
                "{} {}{}",
                quote_ident(name),
                type_sql(db, &argument.data_type),
                default
            )
        }
    }
}

fn render_view(db: &Database, view: &View) -> String {
    let query = view.query.trim_end();
    let terminator = if query.ends_with(';') { "" } else { ";" };
    format!(
        "CREATE VIEW {}.{} AS\n{}{}",
        quote_ident(db.schema_name(view.schema)),
        quote_ident(&view.name),
        query,
        terminator
    )
}

fn render_trigger(db: &Database, trigger: &Trigger) -> String {
    let when = match trigger.when {
        TriggerWhen::Before => "BEFORE",
        TriggerWhen::After => "AFTER",
        TriggerWhen::Instead => "INSTEAD OF",
    };
    let events: Vec<String> = trigger.events.iter().map(|e| e.to_uppercase()).collect();
    let for_each = match trigger.for_each {
        ForEach::Row => "ROW",
        ForEach::Statement => "STATEMENT",
    };
    format!(
        "CREATE TRIGGER {}\n{} {} ON {}\nFOR EACH {}\nEXECUTE PROCEDURE {}();",
        trigger.name,
        when,
        events.join(" OR "),
        qualified_ident(db, trigger.table),
        for_each,
        qualified_ident(db, trigger.function)
    )
}

fn render_role(db: &Database, role: &Role) -> Vec<String> {
    let mut attributes: Vec<&str> = Vec::new();
    if role.login {
        attributes.push("LOGIN");
    }
    attributes.push(if role.superuser { "SUPERUSER" } else { "NOSUPERUSER" });
    attributes.push(if role.inherit { "INHERIT" } else { "NOINHERIT" });
    attributes.push(if role.createdb { "CREATEDB" } else { "NOCREATEDB" });
    attributes.push(if role.createrole { "CREATEROLE" } else { "NOCREATEROLE" });

    let mut statements = vec![format!(
        "DO\n$$\nBEGIN\nIF NOT EXISTS(SELECT * FROM pg_roles WHERE rolname = {}) THEN\nCREATE ROLE {}\n{};\nEND IF;\nEND\n$$;",
        quote_string(&escape_string(&role.name)),
        role.name,
        attributes.join(" ")
    )];
    for &membership in &role.memberships {
        statements.push(format!(
            "GRANT {} TO {};",
            role_name(db, membership),
            role.name
        ));
    }
    statements
}

fn render_cast(db: &Database, cast: &Cast) -> String {
    let implicit = if cast.implicit { " AS IMPLICIT" } else { "" };
    format!(
        "CREATE CAST ({} AS {}) WITH FUNCTION {}({}){};",
        type_sql(db, &cast.source),
        type_sql(db, &cast.target),
        qualified_ident(db, cast.function),
        type_sql(db, &cast.source),
        implicit
    )
}

fn render_aggregate(db: &Database, aggregate: &Aggregate) -> String {
    let arguments: Vec<String> = aggregate
        .arguments
        .iter()
        .map(|a| render_argument(db, a))
        .collect();
    format!(
        "CREATE AGGREGATE {}.{} ({}) (\n    SFUNC = {},\n    STYPE = {}\n);",
        quote_ident(db.schema_name(aggregate.schema)),
        quote_ident(&aggregate.name),
        arguments.join(", "),
        qualified_ident(db, aggregate.sfunc),
        type_sql(db, &aggregate.stype)
    )
}

fn render_row(db: &Database, row: &Row) -> String {
    let columns: Vec<&str> = row.values.iter().map(|(c, _)| c.as_str()).collect();
    let values: Vec<&str> = row.values.iter().map(|(_, v)| v.as_str()).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        qualified_ident(db, row.table),
        columns.join(", "),
        values.join(", ")
    )
}

fn render_foreign_key(db: &Database, table: &Table, index: usize, fk: &ForeignKey) -> String {
    let schema_name = db.schema_name(table.schema);
    let key_name = match &fk.name {
        Some(name) => name.clone(),
        None => format!("{}_{}_fk_{}", schema_name, table.name, index),
    };
    let on_update = match &fk.on_update {
        Some(action) => format!(" ON UPDATE {}", action.to_uppercase()),
        None => String::new(),
    };
    let on_delete = match &fk.on_delete {
        Some(action) => format!(" ON DELETE {}", action.to_uppercase()),
        None => String::new(),
    };
    format!(
        "ALTER TABLE {}.{} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}){}{};",
        quote_ident(schema_name),
        quote_ident(&table.name),
        quote_ident(&key_name),
        fk.columns.join(", "),
        qualified_ident(db, fk.ref_table),
        fk.ref_columns.join(", "),
        on_update,
        on_delete
    )
}

fn volatility_sql(volatility: Volatility) -> &'static str {
    match volatility {
        Volatility::Volatile => "VOLATILE",
        Volatility::Stable => "STABLE",
        Volatility::Immutable => "IMMUTABLE",
    }
}

fn type_sql(db: &Database, data_type: &DataType) -> String {
    match data_type {
        DataType::Base(name) => name.clone(),
        DataType::Object(r) => qualified_ident(db, *r),
    }
}

/// Schema-qualified, quoted identifier of an object reference.
fn qualified_ident(db: &Database, r: ObjRef) -> String {
    let obj = db.get(r);
    match (obj.schema(), obj.name()) {
        (Some(schema), Some(name)) => format!(
            "{}.{}",
            quote_ident(db.schema_name(schema)),
            quote_ident(name)
        ),
        (None, Some(name)) => quote_ident(name),
        _ => String::new(),
    }
}

fn role_name(db: &Database, r: ObjRef) -> String {
    match db.get(r) {
        DbObject::Role(role) => role.name.clone(),
        _ => String::new(),
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident)
}

pub fn quote_string(string: &str) -> String {
    format!("'{}'", string)
}

/// Double embedded single quotes; applied to every free-form string
/// before it is single-quoted.
pub fn escape_string(string: &str) -> String {
    string.replace('\'', "''")
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

    fn render(input: &str) -> Vec<String> {
        SqlRenderer::default().render(&model(input)).unwrap()
    }

    #[test]
    fn test_idempotent_mode_toggle() {
        let input = r#"
extensions: [btree_gist]
objects:
  - schema:
      name: s
  - table:
      schema: s
      name: t
      columns:
        - name: id
          data_type: integer
"#;
        let db = model(input);

        let guarded = SqlRenderer { if_not_exists: true }.render(&db).unwrap();
        assert!(guarded.contains(&"CREATE EXTENSION IF NOT EXISTS \"btree_gist\";".to_string()));
        assert!(guarded.contains(&"CREATE SCHEMA IF NOT EXISTS \"s\";".to_string()));
        assert!(guarded.iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS \"s\".\"t\"")));

        let plain = SqlRenderer::default().render(&db).unwrap();
        assert!(plain.contains(&"CREATE SCHEMA \"s\";".to_string()));
        assert!(!plain.iter().any(|s| s.contains("IF NOT EXISTS \"s\".\"t\"")));
    }

    #[test]
    fn test_unnamed_foreign_key_gets_synthesized_name() {
        let statements = render(
            r#"
objects:
  - table:
      schema: sales
      name: orders
      columns:
        - name: customer_id
          data_type: integer
      foreign_keys:
        - columns: [customer_id]
          references: customers
          ref_columns: [id]
  - table:
      schema: sales
      name: customers
      columns:
        - name: id
          data_type: integer
"#,
        );
        let fk = statements.last().unwrap();
        assert_eq!(
            fk,
            "ALTER TABLE \"sales\".\"orders\" ADD CONSTRAINT \"sales_orders_fk_0\" \
             FOREIGN KEY (customer_id) REFERENCES \"sales\".\"customers\" (id);"
        );
    }

    #[test]
    fn test_mutual_foreign_keys_render_after_tables() {
        let statements = render(
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
          on_delete: cascade
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
        let creates: Vec<usize> = statements
            .iter()
            .enumerate()
            .filter(|(_, s)| s.starts_with("CREATE TABLE"))
            .map(|(i, _)| i)
            .collect();
        let alters: Vec<usize> = statements
            .iter()
            .enumerate()
            .filter(|(_, s)| s.starts_with("ALTER TABLE") && s.contains("FOREIGN KEY"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(creates.len(), 2);
        assert_eq!(alters.len(), 2);
        assert!(creates.iter().max() < alters.iter().min());
        assert!(statements.iter().any(|s| s.ends_with("ON DELETE CASCADE;")));
    }

    #[test]
    fn test_enum_type_statement() {
        let statements = render(
            r#"
objects:
  - enum_type:
      schema: public
      name: status
      labels: [open, "won't fix"]
"#,
        );
        assert!(statements.contains(
            &"CREATE TYPE \"public\".\"status\" AS ENUM (\n  'open',\n  'won''t fix'\n);"
                .to_string()
        ));
    }

    #[test]
    fn test_table_statement_shape() {
        let statements = render(
            r#"
objects:
  - role:
      name: app_reader
  - table:
      schema: public
      name: events
      description: "Event log; it's append-only"
      columns:
        - name: id
          data_type: bigint
          nullable: false
        - name: payload
          data_type: jsonb
          default: "'{}'::jsonb"
      primary_key: [id]
      unique:
        - columns: [payload]
      check:
        - expression: id > 0
      owner: app_reader
      grants:
        - role: app_reader
          privilege: SELECT
      indexes:
        - CREATE INDEX events_payload_idx ON public.events USING gin (payload)
"#,
        );
        let create = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE"))
            .unwrap();
        assert_eq!(
            create,
            "CREATE TABLE \"public\".\"events\"\n(\n  \"id\" bigint NOT NULL,\n  \"payload\" jsonb DEFAULT '{}'::jsonb,\n  PRIMARY KEY (id),\n  UNIQUE (payload),\n  CHECK (id > 0)\n);"
        );
        assert!(statements.contains(
            &"COMMENT ON TABLE \"public\".\"events\" IS 'Event log; it''s append-only';"
                .to_string()
        ));
        assert!(statements.contains(
            &"CREATE INDEX events_payload_idx ON public.events USING gin (payload);".to_string()
        ));
        assert!(statements
            .contains(&"ALTER TABLE \"public\".\"events\" OWNER TO app_reader;".to_string()));
        assert!(statements.contains(
            &"GRANT SELECT ON TABLE \"public\".\"events\" TO app_reader;".to_string()
        ));
    }

    #[test]
    fn test_function_switches_quote_tag_on_collision() {
        let statements = render(
            r#"
objects:
  - function:
      schema: public
      name: noop
      return_type: void
      language: plpgsql
      source: "BEGIN EXECUTE 'SELECT $$x$$'; END;"
"#,
        );
        let function = statements
            .iter()
            .find(|s| s.starts_with("CREATE FUNCTION"))
            .unwrap();
        assert!(function.contains("AS $function$"));
        assert!(function.contains("$function$ LANGUAGE plpgsql VOLATILE;"));
    }

    #[test]
    fn test_function_table_arguments_form_returns_table() {
        let statements = render(
            r#"
objects:
  - function:
      schema: public
      name: daily_totals
      arguments:
        - name: since
          data_type: date
        - name: day
          data_type: date
          mode: table
        - name: total
          data_type: bigint
          mode: table
      returns_set: false
      language: sql
      source: SELECT d, count(*) FROM t GROUP BY d
      volatility: stable
      strict: true
"#,
        );
        let function = statements
            .iter()
            .find(|s| s.starts_with("CREATE FUNCTION"))
            .unwrap();
        assert!(function.starts_with("CREATE FUNCTION \"public\".\"daily_totals\"(\"since\" date)"));
        assert!(function.contains("RETURNS TABLE(\"day\" date, \"total\" bigint)"));
        assert!(function.ends_with("$$ LANGUAGE sql STABLE STRICT;"));
    }

    #[test]
    fn test_trigger_instead_of() {
        let statements = render(
            r#"
objects:
  - view:
      schema: public
      name: active_users
      query: SELECT * FROM public.users WHERE active
      depends_on: [users]
  - table:
      schema: public
      name: users
      columns:
        - name: id
          data_type: integer
  - function:
      schema: public
      name: route_insert
      return_type: trigger
      language: plpgsql
      source: BEGIN RETURN NEW; END;
  - trigger:
      name: active_users_insert
      table: public.active_users
      function: route_insert
      when: instead
      events: [insert]
      for_each: row
"#,
        );
        let trigger = statements
            .iter()
            .find(|s| s.starts_with("CREATE TRIGGER"))
            .unwrap();
        assert_eq!(
            trigger,
            "CREATE TRIGGER active_users_insert\nINSTEAD OF INSERT ON \"public\".\"active_users\"\nFOR EACH ROW\nEXECUTE PROCEDURE \"public\".\"route_insert\"();"
        );
    }

    #[test]
    fn test_sequence_bounds() {
        let statements = render(
            r#"
objects:
  - sequence:
      schema: public
      name: order_id_seq
      start_value: 10
      increment: 2
      maximum_value: 100
"#,
        );
        assert!(statements.contains(
            &"CREATE SEQUENCE public.order_id_seq\nSTART WITH 10\nINCREMENT BY 2\nNO MINVALUE\nMAXVALUE 100\nCACHE 1;"
                .to_string()
        ));
    }

    #[test]
    fn test_role_block_and_memberships() {
        let statements = render(
            r#"
objects:
  - role:
      name: app_reader
      inherit: true
  - role:
      name: app_writer
      login: true
      createdb: true
      memberships: [app_reader]
"#,
        );
        let writer = statements
            .iter()
            .find(|s| s.contains("CREATE ROLE app_writer"))
            .unwrap();
        assert!(writer.contains("IF NOT EXISTS(SELECT * FROM pg_roles WHERE rolname = 'app_writer')"));
        assert!(writer.contains("LOGIN NOSUPERUSER NOINHERIT CREATEDB NOCREATEROLE;"));
        assert!(statements.contains(&"GRANT app_reader TO app_writer;".to_string()));
    }

    #[test]
    fn test_settings_render_before_objects() {
        let statements = render(
            r#"
objects:
  - table:
      schema: public
      name: t
      columns:
        - name: id
          data_type: integer
  - setting:
      name: search_path
      value: public
"#,
        );
        let set_at = statements
            .iter()
            .position(|s| s == "SET search_path TO public;")
            .unwrap();
        let table_at = statements
            .iter()
            .position(|s| s.starts_with("CREATE TABLE"))
            .unwrap();
        assert!(statements[0].starts_with("DO $$ BEGIN\nEXECUTE 'ALTER DATABASE '"));
        assert!(set_at < table_at);
    }

    #[test]
    fn test_row_preserves_declared_value_order() {
        let statements = render(
            r#"
objects:
  - table:
      schema: public
      name: countries
      columns:
        - name: code
          data_type: text
        - name: name
          data_type: text
  - row:
      table: public.countries
      values:
        name: "'Iceland'"
        code: "'IS'"
"#,
        );
        assert!(statements.contains(
            &"INSERT INTO \"public\".\"countries\" (name, code) VALUES ('Iceland', 'IS');"
                .to_string()
        ));
    }

    #[test]
    fn test_cast_and_aggregate() {
        let statements = render(
            r#"
objects:
  - function:
      schema: public
      name: to_point
      arguments:
        - data_type: text
      return_type: point
      language: sql
      source: SELECT $1::point
  - cast:
      source: text
      target: point
      function: to_point
      implicit: true
  - function:
      schema: public
      name: accum
      arguments:
        - data_type: bigint
        - data_type: integer
      return_type: bigint
      language: sql
      source: SELECT $1 + $2
  - aggregate:
      schema: public
      name: total
      arguments:
        - data_type: integer
      sfunc: accum
      stype: bigint
"#,
        );
        assert!(statements.contains(
            &"CREATE CAST (text AS point) WITH FUNCTION \"public\".\"to_point\"(text) AS IMPLICIT;"
                .to_string()
        ));
        assert!(statements.contains(
            &"CREATE AGGREGATE \"public\".\"total\" (integer) (\n    SFUNC = \"public\".\"accum\",\n    STYPE = bigint\n);"
                .to_string()
        ));
    }

    #[test]
    fn test_output_is_deterministic() {
        let input = r#"
extensions: [uuid-ossp]
objects:
  - enum_type:
      schema: app
      name: status
      labels: [new, done]
  - table:
      schema: app
      name: jobs
      columns:
        - name: id
          data_type: uuid
        - name: state
          data_type: status
  - sequence:
      schema: app
      name: job_seq
"#;
        let db = model(input);
        let renderer = SqlRenderer::default();
        let first = renderer.render_to_string(&db).unwrap();
        let second = renderer.render_to_string(&db).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dependency_order_respected_in_output() {
        let statements = render(
            r#"
objects:
  - table:
      schema: app
      name: jobs
      columns:
        - name: state
          data_type: status
  - enum_type:
      schema: app
      name: status
      labels: [new, done]
"#,
        );
        let type_at = statements
            .iter()
            .position(|s| s.starts_with("CREATE TYPE"))
            .unwrap();
        let table_at = statements
            .iter()
            .position(|s| s.starts_with("CREATE TABLE"))
            .unwrap();
        assert!(type_at < table_at);
    }

    #[test]
    fn test_cycle_produces_no_output() {
        let db = model(
            r#"
objects:
  - composite_type:
      schema: public
      name: a
      fields:
        - name: b
          data_type: b
  - composite_type:
      schema: public
      name: b
      fields:
        - name: a
          data_type: a
"#,
        );
        assert!(SqlRenderer::default().render(&db).is_err());
    }

    #[test]
    fn test_view_query_rendered_verbatim() {
        let statements = render(
            r#"
objects:
  - table:
      schema: public
      name: users
      columns:
        - name: id
          data_type: integer
  - view:
      schema: public
      name: user_ids
      query: |-
        SELECT id
        FROM public.users
      depends_on: [users]
"#,
        );
        assert!(statements.contains(
            &"CREATE VIEW \"public\".\"user_ids\" AS\nSELECT id\nFROM public.users;".to_string()
        ));
        let view_at = statements.iter().position(|s| s.starts_with("CREATE VIEW")).unwrap();
        let table_at = statements
            .iter()
            .position(|s| s.starts_with("CREATE TABLE"))
            .unwrap();
        assert!(table_at < view_at);
    }
}
