//! Test harness for the YAML and template engines against fixture files.
//!
//! Every `test/yaml/NAME.yaml` is loaded and compared with the value in
//! `test/json/NAME.json`. Every `test/templates/CASE/` directory is used
//! as a template root: `vars.yaml` (optional) supplies the globals,
//! `main.html` is rendered, and the output must equal `expected.html`.

use std::fs;
use std::path::{Path, PathBuf};

use libportal::{yaml, Engine, Mapping, Value};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// Files matching `pattern` under the test root, sorted.
fn fixture_files(pattern: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(pattern);
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .flatten()
        .collect();
    files.sort();
    files
}

fn file_stem(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().to_string()
}

/// Convert a loaded value into JSON for comparison with the expected files.
fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(seq) => serde_json::Value::Array(seq.iter().map(to_json).collect()),
        Value::Mapping(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

/// Run a single YAML fixture.
fn run_yaml_test(path: &Path) -> Result<(), String> {
    let name = file_stem(path);
    let value = yaml::parse_file(path).map_err(|e| format!("{}: {}", name, e))?;
    let actual = to_json(&value);

    let json_path = test_root().join("json").join(format!("{}.json", name));
    let Ok(expected_text) = fs::read_to_string(&json_path) else {
        println!("  {} => {} (no expected output)", name, actual);
        return Ok(());
    };
    let expected: serde_json::Value = serde_json::from_str(&expected_text)
        .map_err(|e| format!("{}: invalid expected JSON: {}", name, e))?;

    if actual != expected {
        return Err(format!(
            "{}: Output mismatch\n    expected: {}\n    actual:   {}",
            name, expected, actual
        ));
    }
    println!("  {} => {}", name, actual);
    Ok(())
}

/// Run a single template fixture directory.
fn run_template_test(expected_path: &Path) -> Result<(), String> {
    let dir = expected_path.parent().unwrap();
    let name = dir.file_name().unwrap().to_string_lossy().to_string();

    let vars_path = dir.join("vars.yaml");
    let globals = if vars_path.is_file() {
        match yaml::parse_file(&vars_path).map_err(|e| format!("{}: {}", name, e))? {
            Value::Mapping(map) => map,
            other => return Err(format!("{}: vars.yaml is not a mapping: {:?}", name, other)),
        }
    } else {
        Mapping::new()
    };

    let engine = Engine::new(dir, globals, None).map_err(|e| format!("{}: {}", name, e))?;
    let actual = engine
        .template("main.html")
        .and_then(|template| template.render(&Mapping::new()))
        .map_err(|e| format!("{}: {}", name, e))?;
    let expected = fs::read_to_string(expected_path).map_err(|e| format!("{}: {}", name, e))?;

    if actual != expected {
        return Err(format!(
            "{}: Output mismatch\n--- expected\n{}\n--- actual\n{}",
            name, expected, actual
        ));
    }
    println!("  {} => ok", name);
    Ok(())
}

fn report(kind: &str, results: Vec<Result<(), String>>) {
    let failed: Vec<String> = results.into_iter().filter_map(Result::err).collect();
    if !failed.is_empty() {
        println!("\nErrors:");
        for error in &failed {
            println!("  - {}", error);
        }
    }
    assert!(failed.is_empty(), "{} {} fixtures failed", failed.len(), kind);
}

#[test]
fn test_all_yaml_fixtures() {
    let files = fixture_files("yaml/*.yaml");
    assert!(!files.is_empty(), "no YAML fixtures found");

    println!("\nRunning {} YAML fixtures:", files.len());
    report("YAML", files.iter().map(|f| run_yaml_test(f)).collect());
}

#[test]
fn test_all_template_fixtures() {
    let files = fixture_files("templates/*/expected.html");
    assert!(!files.is_empty(), "no template fixtures found");

    println!("\nRunning {} template fixtures:", files.len());
    report("template", files.iter().map(|f| run_template_test(f)).collect());
}

/// Dumping a fixture and loading the dump must give the same tree back
/// for documents without the dumper's known lossy cases.
#[test]
fn test_yaml_fixtures_round_trip_through_dump() {
    for name in ["portal-config", "block-scalars", "root-sequence"] {
        let path = test_root().join("yaml").join(format!("{}.yaml", name));
        let value = yaml::parse_file(&path).unwrap();
        let dumped = yaml::dump(&value);
        assert_eq!(yaml::parse(&dumped), value, "{} did not round-trip:\n{}", name, dumped);
    }
}
