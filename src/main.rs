//! Regent CLI
//!
//! Usage:
//!   regent [OPTIONS] [FILE]
//!
//! Options:
//!   -o, --options <FILE>  Load-policy options file (TOML format)
//!   -d, --defines         Treat the file as a batch of DEFINE sub-templates
//!   -c, --check           Validate only; print nothing on success
//!   -g, --grammar         Show the directive grammar reference
//!   -h, --help            Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;

use regent::model::MarkerKind;
use regent::{load_all_defined_with_options, load_with_options, LoadOptions, LoadedTemplate};

#[derive(Parser)]
#[command(name = "regent")]
#[command(about = "Region-based templating engine for source-code generation")]
struct Cli {
    /// Template file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Load-policy options file (TOML format)
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Treat the file as a batch of DEFINE sub-templates
    #[arg(short, long)]
    defines: bool,

    /// Validate only; print nothing on success
    #[arg(short, long)]
    check: bool,

    /// Show the directive grammar reference
    #[arg(short, long)]
    grammar: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.grammar {
        print_grammar();
        return;
    }

    if cli.input.is_none() && io::stdin().is_terminal() {
        eprintln!("regent: no input file and stdin is a terminal (try --help)");
        std::process::exit(2);
    }

    let options = match &cli.options {
        Some(path) => match LoadOptions::from_file(path) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("Error loading options '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => LoadOptions::default(),
    };

    let (source, filename) = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, path.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, "<stdin>".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    if cli.defines {
        match load_all_defined_with_options(&source, &options) {
            Ok(templates) => {
                if !cli.check {
                    let mut names: Vec<_> = templates.keys().collect();
                    names.sort();
                    for name in names {
                        print!("{}", summarize(name, &templates[name]));
                    }
                }
            }
            Err(e) => {
                eprintln!("{}", e.format(&source, &filename));
                std::process::exit(1);
            }
        }
    } else {
        match load_with_options(&source, &options) {
            Ok(model) => {
                if !cli.check {
                    print!("{}", summarize(&filename, &model));
                }
            }
            Err(e) => {
                eprintln!("{}", e.format(&source, &filename));
                std::process::exit(1);
            }
        }
    }
}

/// Render a template's directive structure as an indented tree
fn summarize(name: &str, model: &LoadedTemplate) -> String {
    let mut out = format!(
        "{}: {} ranges, {} substitution sites, {} markers\n",
        name,
        model.ranges().len(),
        model.site_count(),
        model.markers().len()
    );
    let mut depth = 0usize;
    for marker in model.markers() {
        match &marker.kind {
            MarkerKind::Begin(region) => {
                out.push_str(&format!(
                    "{}{} [range {}, slot {}]\n",
                    "  ".repeat(depth + 1),
                    region,
                    marker.range_index,
                    marker.slot_index
                ));
                depth += 1;
            }
            MarkerKind::End => {
                depth = depth.saturating_sub(1);
            }
        }
    }
    out
}

fn print_grammar() {
    println!(
        r#"REGENT DIRECTIVE GRAMMAR

Directive lines start with TEMPLATE, optionally behind a comment opener
(//, #, --, ;, *, /*, <!-- by default). Every region is closed by a
matching TEMPLATE END; regions nest as a stack.

  TEMPLATE FOREACH($var : $collection)
      Repeatable region. The driver begins zero or more iterations; $var
      becomes a loop-scoped name usable as $var.field inside the body.

  TEMPLATE REPLACE("pattern", $accessor [, REMOVE_IF_NULL])
      Every regex match of "pattern" in the region body becomes a
      substitution site resolved through $accessor. REMOVE_IF_NULL lets
      the driver clear the match (by default, its whole line) instead of
      supplying a value.

  TEMPLATE DEFINE("name")
      Delimits a named, independently loadable sub-template within a
      larger file (batch loading only).

  TEMPLATE INSERT($accessor)
      A splice point for literal text or another rendered template. The
      region body is placeholder content and is never rendered.

  TEMPLATE END
      Closes the innermost open region.
"#
    );
}
