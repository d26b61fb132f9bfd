mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use doctree::ParseError;
use engine::SessionConfig;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "livedoc", version, about = "Execute the code in a Markdown document")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log engine activity to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a document and write the result as Markdown
    Run(RunArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Interpreter settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interpreter executable, overriding the configuration
    #[arg(long)]
    python: Option<String>,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Markdown document to execute
    file: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    session: SessionArgs,

    /// Parse only, don't execute (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the parsed document tree
    #[arg(long)]
    ast: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,

    #[command(flatten)]
    session: SessionArgs,
}

fn main() {
    let cli = Cli::parse_from(with_default_subcommand(std::env::args().collect()));
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => do_run(args, cli.no_color),
        Command::Test(args) => do_test(args, cli.no_color),
    };
    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            process::exit(1);
        }
    }
}

/// `livedoc file.md` means `livedoc run file.md`.
fn with_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let first = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, arg)| !arg.starts_with('-'));
    if let Some((pos, arg)) = first {
        if !SUBCOMMANDS.contains(&arg.as_str()) {
            args.insert(pos, "run".to_string());
        }
    }
    args
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn load_session_config(args: &SessionArgs) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("cannot load config '{}'", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(program) = &args.python {
        config.program = program.clone();
    }
    debug!(program = %config.program, "session configuration");
    Ok(config)
}

fn do_run(args: RunArgs, no_color: bool) -> Result<i32> {
    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read '{}'", args.file.display()))?;

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.display().to_string(), source.clone());

    let document = match doctree::Parser::new(source, file_id).parse() {
        Ok(document) => document,
        Err(errors) => {
            emit_parse_errors(&files, &errors, no_color);
            return Ok(1);
        }
    };

    if args.check {
        eprintln!("ok: {} parsed successfully", args.file.display());
        return Ok(0);
    }

    if args.ast {
        println!("{:#?}", document);
        return Ok(0);
    }

    let config = load_session_config(&args.session)?;
    let document = engine::execute_document(document, &config)
        .with_context(|| format!("cannot execute '{}'", args.file.display()))?;
    let rendered = document.to_string();

    match &args.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("cannot write '{}'", path.display()))?,
        None => print!("{}", rendered),
    }
    Ok(0)
}

fn do_test(args: TestArgs, no_color: bool) -> Result<i32> {
    let path = Path::new(&args.path);
    if args.list_categories {
        test_runner::list_categories(path);
        return Ok(0);
    }
    let config = load_session_config(&args.session)?;
    Ok(test_runner::run_tests(path, &config, no_color, &args.category))
}

fn emit_parse_errors(files: &SimpleFiles<String, String>, errors: &[ParseError], no_color: bool) {
    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}
