//! reStructuredText documentation rendering over the object model.
//!
//! Documentation walks schemas alphabetically and their objects in
//! declaration order; it never needs the dependency ordering the SQL
//! renderer computes.

use crate::model::{Database, DbObject, EnumType, Function, ObjRef, Table, View};

pub fn render(db: &Database) -> String {
    let mut output = String::new();

    for (name, &schema) in &db.schemas {
        render_schema_section(&mut output, db, name, schema);
    }

    output
}

fn render_schema_section(output: &mut String, db: &Database, name: &str, schema: ObjRef) {
    heading(output, &format!("Schema {}", name), '=');

    for obj in &db.objects {
        if obj.schema() != Some(schema) {
            continue;
        }
        match obj {
            DbObject::Table(table) => render_table_section(output, db, table),
            DbObject::View(view) => render_view_section(output, view),
            DbObject::EnumType(enum_type) => render_enum_section(output, enum_type),
            DbObject::Function(function) => render_function_section(output, db, function),
            _ => {}
        }
    }
}

fn render_table_section(output: &mut String, db: &Database, table: &Table) {
    heading(output, &table.name, '-');

    if let Some(description) = &table.description {
        output.push_str(description);
        output.push_str("\n\n");
    }

    output.push_str(".. list-table::\n  :header-rows: 1\n\n");
    output.push_str("  * - Column\n    - Type\n    - Nullable\n    - Description\n");
    for column in &table.columns {
        output.push_str(&format!(
            "  * - {}\n    - {}\n    - {}\n    - {}\n",
            column.name,
            db.type_name(&column.data_type),
            if column.nullable { "yes" } else { "no" },
            column.description.as_deref().unwrap_or("")
        ));
    }
    output.push('\n');
}

fn render_view_section(output: &mut String, view: &View) {
    heading(output, &view.name, '-');

    output.push_str("::\n\n");
    for line in view.query.lines() {
        output.push_str(&format!("    {}\n", line));
    }
    output.push('\n');
}

fn render_enum_section(output: &mut String, enum_type: &EnumType) {
    heading(output, &enum_type.name, '-');

    output.push_str(&format!("Enumeration: {}\n\n", enum_type.labels.join(", ")));
}

fn render_function_section(output: &mut String, db: &Database, function: &Function) {
    heading(output, &format!("{}()", function.name), '-');

    let arguments: Vec<String> = function
        .arguments
        .iter()
        .map(|a| match &a.name {
            Some(name) => format!("{} {}", name, db.type_name(&a.data_type)),
            None => db.type_name(&a.data_type),
        })
        .collect();
    let returns = match &function.return_type {
        Some(t) => db.type_name(t),
        None => "void".to_string(),
    };
    output.push_str(&format!(
        "``{}({}) -> {}``, language {}\n\n",
        function.name,
        arguments.join(", "),
        returns,
        function.language
    ));
}

fn heading(output: &mut String, text: &str, underline: char) {
    output.push_str(text);
    output.push('\n');
    output.push_str(&underline.to_string().repeat(text.chars().count()));
    output.push_str("\n\n");
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

    #[test]
    fn test_table_documentation() {
        let db = model(
            r#"
objects:
  - table:
      schema: public
      name: users
      description: Registered accounts.
      columns:
        - name: id
          data_type: integer
          nullable: false
          description: Surrogate key
        - name: email
          data_type: text
"#,
        );
        let rst = render(&db);
        assert!(rst.contains("Schema public\n============="));
        assert!(rst.contains("users\n-----"));
        assert!(rst.contains("Registered accounts."));
        assert!(rst.contains("  * - id\n    - integer\n    - no\n    - Surrogate key\n"));
    }

    #[test]
    fn test_schemas_documented_alphabetically() {
        let db = model(
            r#"
objects:
  - table:
      schema: zoo
      name: animals
      columns: []
  - table:
      schema: app
      name: jobs
      columns: []
"#,
        );
        let rst = render(&db);
        let app_at = rst.find("Schema app").unwrap();
        let zoo_at = rst.find("Schema zoo").unwrap();
        assert!(app_at < zoo_at);
    }

    #[test]
    fn test_function_signature_line() {
        let db = model(
            r#"
objects:
  - function:
      schema: public
      name: add_one
      arguments:
        - name: n
          data_type: integer
      return_type: integer
      language: sql
      source: SELECT n + 1
"#,
        );
        let rst = render(&db);
        assert!(rst.contains("``add_one(n integer) -> integer``, language sql"));
    }
}
