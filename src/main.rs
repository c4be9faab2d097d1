use rustddl::builder;
use rustddl::doc::Document;
use rustddl::rst;
use rustddl::sql::SqlRenderer;
use std::env;
use std::fs;
use std::process;

enum Format {
    Sql,
    Rst,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <schema.yaml> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -o, --output <file>   Output file (default: stdout)");
        eprintln!("  -f, --format <kind>   Output format: sql, rst (default: sql)");
        eprintln!("  --if-not-exists       Add IF NOT EXISTS guards to CREATE statements");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut format = Format::Sql;
    let mut if_not_exists = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            "-f" | "--format" => {
                i += 1;
                if i < args.len() {
                    format = match args[i].as_str() {
                        "sql" => Format::Sql,
                        "rst" => Format::Rst,
                        other => {
                            eprintln!("Invalid format: {}", other);
                            process::exit(1);
                        }
                    };
                }
            }
            "--if-not-exists" => {
                if_not_exists = true;
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let document: Document = match serde_yaml::from_str(&input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Invalid schema document: {}", e);
            process::exit(1);
        }
    };

    let db = match builder::build(&document) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Build error: {}", e);
            process::exit(1);
        }
    };

    let output = match format {
        Format::Sql => {
            let renderer = SqlRenderer { if_not_exists };
            match renderer.render_to_string(&db) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Order error: {}", e);
                    process::exit(1);
                }
            }
        }
        Format::Rst => rst::render(&db),
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &output) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => print!("{}", output),
    }
}
