//! Portal command-line tool.
//!
//! Usage:
//!   portal convert [FILE] [--from FORMAT] [--to FORMAT] [--output FILE]
//!   portal render TEMPLATE [--root DIR] [--vars FILE]... [--set KEY=VALUE]...
//!
//! `convert` reads a settings file (or stdin) and writes it in another
//! format. `render` renders a template from a template root with YAML
//! variables as globals.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use libportal::yaml::{self, DumpOptions};
use libportal::{compile_from_string, Engine, Mapping, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod transcode;

use transcode::{InputFormat, OutputFormat};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Convert Portal settings files and render Portal templates")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a settings file between formats
    Convert {
        #[arg(help = "Input file (reads stdin if omitted or `-`)")]
        file: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "lenient", help = "Input format")]
        from: InputFormat,

        #[arg(short, long, value_enum, default_value = "json", help = "Output format")]
        to: OutputFormat,

        #[arg(long, default_value_t = 2, help = "Indent width for --to yaml")]
        indent: usize,

        #[arg(long, default_value_t = 40, help = "Fold width for --to yaml (0 disables)")]
        wrap: usize,

        #[arg(short, long, help = "Write output to this file")]
        output: Option<PathBuf>,
    },

    /// Render a template
    Render {
        #[arg(help = "Template path relative to the root, or template text with --string")]
        template: String,

        #[arg(short, long, default_value = ".", help = "Template root directory")]
        root: PathBuf,

        #[arg(long = "vars", help = "YAML file of global variables (repeatable)")]
        vars: Vec<PathBuf>,

        #[arg(short = 'S', long = "set", help = "Set a variable (key=value, value typed as YAML)")]
        set: Vec<String>,

        #[arg(short, long, help = "Prefer templates localized for this locale")]
        locale: Option<String>,

        #[arg(long, help = "Disable HTML escaping of {{ }} output")]
        raw: bool,

        #[arg(long, help = "Treat TEMPLATE as template text")]
        string: bool,

        #[arg(short, long, help = "Write output to this file")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args.command) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Convert {
            file,
            from,
            to,
            indent,
            wrap,
            output,
        } => {
            let input = read_input(file.as_deref())?;
            let value = transcode::decode(&input, from)
                .with_context(|| format!("cannot read input as {:?}", from))?;
            let options = DumpOptions::default().with_indent(indent).with_wrap(wrap);
            let text = transcode::encode(&value, to, &options)
                .with_context(|| format!("cannot convert to {:?}", to))?;
            write_output(&text, output.as_deref())
        }
        Commands::Render {
            template,
            root,
            vars,
            set,
            locale,
            raw,
            string,
            output,
        } => {
            let globals = load_globals(&vars, &set)?;
            let text = if string {
                let compiled = compile_from_string(&template, !raw)?;
                compiled.render(&globals)?
            } else {
                let engine = Engine::new(&root, globals, locale.as_deref())?.with_auto_escape(!raw);
                debug!(template = template.as_str(), root = %root.display(), "rendering");
                engine.template(&template)?.render(&Mapping::new())?
            };
            write_output(&text, output.as_deref())
        }
    }
}

/// Merge the `--vars` files in order, then apply `--set` overrides.
fn load_globals(files: &[PathBuf], assignments: &[String]) -> Result<Mapping> {
    let mut globals = Mapping::new();
    for file in files {
        match yaml::parse_file(file)? {
            Value::Mapping(map) => globals.extend(map),
            Value::Sequence(seq) if seq.is_empty() => {}
            other => bail!(
                "{}: variables must be a mapping, found {}",
                file.display(),
                other.type_name()
            ),
        }
    }
    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        globals.insert(key, value);
    }
    Ok(globals)
}

fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let Some((key, value)) = assignment.split_once('=') else {
        bail!("invalid --set `{}`, expected key=value", assignment);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid --set `{}`, empty key", assignment);
    }
    Ok((key.to_string(), yaml::to_type(value.trim())))
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
        }
        _ => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("cannot read stdin")?;
            Ok(input)
        }
    }
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .and_then(|()| handle.flush())
                .context("cannot write to stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment_types_value() {
        assert_eq!(
            parse_assignment("small=true").unwrap(),
            ("small".to_string(), Value::Bool(true))
        );
        assert_eq!(
            parse_assignment("title = My Portal").unwrap(),
            ("title".to_string(), Value::from("My Portal"))
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_load_globals_merges_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.yaml");
        let second = dir.path().join("b.yaml");
        fs::write(&first, "name: First\ncount: 1\n").unwrap();
        fs::write(&second, "name: Second\n").unwrap();

        let globals = load_globals(&[first, second], &["count=3".to_string()]).unwrap();
        assert_eq!(globals.get("name"), Some(&Value::from("Second")));
        assert_eq!(globals.get("count"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_load_globals_rejects_sequence_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("list.yaml");
        fs::write(&file, "- just\n- a list\n").unwrap();
        assert!(load_globals(&[file], &[]).is_err());
    }

    #[test]
    fn test_cli_parses_render_flags() {
        let args = Args::parse_from([
            "portal", "render", "index.html", "--root", "tpl", "--set", "a=1", "--raw",
        ]);
        match args.command {
            Commands::Render { template, root, set, raw, .. } => {
                assert_eq!(template, "index.html");
                assert_eq!(root, PathBuf::from("tpl"));
                assert_eq!(set, ["a=1"]);
                assert!(raw);
            }
            _ => panic!("expected render"),
        }
    }
}
