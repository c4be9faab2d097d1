pub mod builder;
pub mod doc;
pub mod graph;
pub mod model;
pub mod rst;
pub mod sql;

use wasm_bindgen::prelude::*;

use doc::Document;
use sql::SqlRenderer;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Compile a YAML schema document to SQL DDL
#[wasm_bindgen(js_name = "schemaToSql")]
pub fn schema_to_sql(source: &str, if_not_exists: Option<bool>) -> Result<String, String> {
    let document: Document = serde_yaml::from_str(source).map_err(|e| e.to_string())?;
    let db = builder::build(&document).map_err(|e| e.to_string())?;

    let renderer = SqlRenderer {
        if_not_exists: if_not_exists.unwrap_or(false),
    };
    renderer.render_to_string(&db).map_err(|e| e.to_string())
}

/// Render reStructuredText documentation for a YAML schema document
#[wasm_bindgen(js_name = "schemaToRst")]
pub fn schema_to_rst(source: &str) -> Result<String, String> {
    let document: Document = serde_yaml::from_str(source).map_err(|e| e.to_string())?;
    let db = builder::build(&document).map_err(|e| e.to_string())?;

    Ok(rst::render(&db))
}
