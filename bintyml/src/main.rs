//! tyml command-line tool for checking, formatting, querying, and transcoding
//! tyml documents.
//!
//! Usage: tyml [OPTIONS] [FILE|DIR]
//!
//! Options:
//!   -f, --from <FORMAT>    Input format (tyml, yaml) [default: tyml]
//!   -t, --to <FORMAT>      Output format (tyml, yaml) [default: tyml]
//!   -g, --get <PATH>       Print only the entity at a dotted path
//!   -w, --write            Write output to file with inferred name
//!   -o, --output <FILE>    Write output to specified file
//!   --check                Check if file is valid (exit 0 if valid, 1 if invalid)
//!   --max-line <N>         Longest line the lexer accepts [env: TYML_MAX_LINE]
//!   -h, --help             Print help
//!   -V, --version          Print version

use libtyml::{parse_with, serialize_with, Entity, Options, DEFAULT_MAX_LINE, KEYLESS};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

mod transcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Tyml,
    Yaml,
}

fn parse_format(s: &str) -> Option<Format> {
    match s {
        "tyml" => Some(Format::Tyml),
        "yaml" | "yml" => Some(Format::Yaml),
        _ => None,
    }
}

fn format_extension(format: Format) -> &'static str {
    match format {
        Format::Tyml => "tyml",
        Format::Yaml => "yaml",
    }
}

/// Settings shared by every input the tool processes.
struct Job<'a> {
    from: Format,
    to: Format,
    get: Option<&'a str>,
    output_file: Option<&'a str>,
    write_back: bool,
    check_only: bool,
    max_line: usize,
}

/// Get the line limit from TYML_MAX_LINE or the library default.
fn env_max_line() -> usize {
    env::var("TYML_MAX_LINE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_LINE)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut from_format = Format::Tyml;
    let mut to_format = Format::Tyml;
    let mut get_path: Option<&str> = None;
    let mut write_back = false;
    let mut output_file: Option<&str> = None;
    let mut check_only = false;
    let mut max_line: Option<usize> = None;
    let mut input_path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-V" | "--version" => {
                println!("tyml {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "-f" | "--from" | "-t" | "--to" => {
                let flag = &args[i];
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: {} requires a format argument", flag);
                    process::exit(1);
                }
                let Some(format) = parse_format(&args[i]) else {
                    eprintln!("Error: Unknown format: {}", args[i]);
                    process::exit(1);
                };
                if flag == "-f" || flag == "--from" {
                    from_format = format;
                } else {
                    to_format = format;
                }
            }
            "-g" | "--get" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --get requires a path argument");
                    process::exit(1);
                }
                get_path = Some(&args[i]);
            }
            "-w" | "--write" => {
                write_back = true;
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires an argument");
                    process::exit(1);
                }
                output_file = Some(&args[i]);
            }
            "--check" => {
                check_only = true;
            }
            "--max-line" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse().ok()) {
                    Some(n) if n > 0 => max_line = Some(n),
                    _ => {
                        eprintln!("Error: --max-line requires a positive number");
                        process::exit(1);
                    }
                }
            }
            "-" => {
                // Explicit stdin
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                process::exit(1);
            }
            _ => {
                if input_path.is_some() {
                    eprintln!("Error: Multiple input paths not supported");
                    process::exit(1);
                }
                input_path = Some(&args[i]);
            }
        }
        i += 1;
    }

    if write_back && output_file.is_some() {
        eprintln!("Error: --write and --output are mutually exclusive");
        process::exit(1);
    }

    let job = Job {
        from: from_format,
        to: to_format,
        get: get_path,
        output_file,
        write_back,
        check_only,
        max_line: max_line.unwrap_or_else(env_max_line),
    };
    debug!(from = ?job.from, to = ?job.to, max_line = job.max_line, "starting");

    if let Some(path) = input_path {
        if Path::new(path).is_dir() {
            if output_file.is_some() {
                eprintln!("Error: --output cannot be used with directory input");
                process::exit(1);
            }
            process_directory(path, &job);
            return;
        }
    }

    let input = match input_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading {}: {}", path, e);
                process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buffer) {
                eprintln!("Error reading stdin: {}", e);
                process::exit(1);
            }
            buffer
        }
    };

    process::exit(process_input(&input, input_path, &job));
}

fn process_directory(dir_path: &str, job: &Job<'_>) {
    let entries = match fs::read_dir(dir_path) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error reading directory {}: {}", dir_path, e);
            process::exit(1);
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|e| e == "tyml").unwrap_or(false))
        .collect();
    paths.sort();

    let mut had_errors = false;
    for path in paths {
        let path_str = path.to_string_lossy();
        let input = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading {}: {}", path_str, e);
                had_errors = true;
                continue;
            }
        };
        if process_input(&input, Some(&path_str), job) != 0 {
            had_errors = true;
        }
    }

    process::exit(if had_errors { 1 } else { 0 });
}

fn process_input(input: &str, input_file: Option<&str>, job: &Job<'_>) -> i32 {
    let filename = input_file.map(|p| {
        Path::new(p)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| p.to_string())
    });
    let mut options = Options::new().with_max_line(job.max_line);
    options.filename = filename;

    let decoded = match job.from {
        Format::Tyml => parse_with(input, &options).map_err(|e| e.to_string()),
        Format::Yaml => transcode::yaml::decode(input),
    };
    let root = match decoded {
        Ok(root) => root,
        Err(e) => {
            match input_file {
                Some(path) => eprintln!("{}: {}", path, e),
                None => eprintln!("Parse error: {}", e),
            }
            return 1;
        }
    };

    if job.check_only {
        if let Some(path) = input_file {
            println!("{}: ok", path);
        }
        return 0;
    }

    let selected = match job.get {
        Some(route) => match select(&root, route) {
            Ok(entity) => entity,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        },
        None => &root,
    };

    let output = match job.to {
        Format::Tyml => Ok(serialize_with(selected, &options)),
        Format::Yaml => transcode::yaml::encode(selected),
    };
    match output {
        Ok(text) => write_text_output(&text, job, input_file),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Resolve a dotted route such as `services.0.port`. Index segments on a
/// document whose root is a top-level sequence address that sequence.
fn select<'e>(root: &'e Entity, route: &str) -> Result<&'e Entity, String> {
    let segments: Vec<&str> = route.split('.').filter(|s| !s.is_empty()).collect();
    let base = match (segments.first(), root.get(KEYLESS)) {
        (Some(first), Some(sequence)) if root.get(first).is_none() => sequence,
        _ => root,
    };
    base.resolve(&segments).map_err(|e| e.to_string())
}

fn write_text_output(output: &str, job: &Job<'_>, input_file: Option<&str>) -> i32 {
    if let Some(path) = job.output_file {
        if let Err(e) = fs::write(path, output) {
            eprintln!("Error writing {}: {}", path, e);
            return 1;
        }
    } else if job.write_back {
        let Some(input_path) = input_file else {
            eprintln!("Error: --write requires an input file");
            return 1;
        };
        let output_path = Path::new(input_path).with_extension(format_extension(job.to));
        if let Err(e) = fs::write(&output_path, output) {
            eprintln!("Error writing {}: {}", output_path.display(), e);
            return 1;
        }
    } else {
        print!("{}", output);
        // Ensure output ends with newline
        if !output.ends_with('\n') {
            println!();
        }
    }
    0
}

fn print_help() {
    println!(
        "tyml - tyml command-line tool

USAGE:
    tyml [OPTIONS] [FILE|DIR]

ARGS:
    [FILE|DIR]    Input file or directory (reads from stdin if not provided)
                  When a directory is given, processes all .tyml files in it

OPTIONS:
    -f, --from <FORMAT>    Input format [default: tyml]
                           Supported: tyml, yaml

    -t, --to <FORMAT>      Output format [default: tyml]
                           Supported: tyml, yaml

    -g, --get <PATH>       Print only the entity at a dotted path, e.g. services.0.port

    -w, --write            Write output to file with inferred extension

    -o, --output <FILE>    Write output to specified file (not valid with directory input)

    --check                Check if input is valid (exit 0 if valid, 1 if invalid)

    --max-line <N>         Longest line the lexer accepts; longer values are
                           written as folded blocks [env: TYML_MAX_LINE, default: {}]

    -h, --help             Print help

    -V, --version          Print version

ENVIRONMENT:
    RUST_LOG               Diagnostic filter, e.g. RUST_LOG=libtyml=trace

EXAMPLES:
    # Reformat a file to canonical tyml
    tyml config.tyml

    # Validate all tyml files in a directory
    tyml --check ./configs/

    # Print one value
    tyml -g server.port config.tyml

    # Convert tyml to YAML
    tyml -t yaml config.tyml

    # Convert YAML to tyml
    tyml -f yaml -t tyml config.yaml

    # Convert every tyml file in a directory to YAML alongside it
    tyml -t yaml -w ./configs/
",
        DEFAULT_MAX_LINE
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("tyml"), Some(Format::Tyml));
        assert_eq!(parse_format("yml"), Some(Format::Yaml));
        assert_eq!(parse_format("json"), None);
    }

    #[test]
    fn test_select() {
        let root = libtyml::parse("server:\n  ports: [80, 443]\n").unwrap();
        assert_eq!(select(&root, "server.ports.1").unwrap().raw(), Some("443"));
        assert_eq!(select(&root, "").unwrap(), &root);
        assert!(select(&root, "server.missing").is_err());

        let list = libtyml::parse("- a\n- b\n").unwrap();
        assert_eq!(select(&list, "1").unwrap().raw(), Some("b"));
    }
}
