use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rfa::graph::Graph;
use rfa::library::FunctionLibrary;
use rfa::pass::{PassOptions, RearrangePass};
use rfa::program::{summary, Program, ProgramError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitFormat {
    Json,
    Dot,
    Summary,
}

#[derive(Parser, Debug)]
#[command(
    name = "rfa",
    version,
    about = "Moves resource arguments of functional control flow and calls to the end of their signatures"
)]
struct Cli {
    /// Input program (JSON: top-level graph plus function library)
    input: PathBuf,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = EmitFormat::Json)]
    emit: EmitFormat,

    /// Entry op and its function attribute, as OP=ATTR (repeatable;
    /// replaces the configured set)
    #[arg(long = "entry-op", value_parser = parse_entry_op)]
    entry_op: Vec<(String, String)>,

    /// Pass options file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report failing entry ops and continue with the rest
    #[arg(long)]
    keep_going: bool,

    /// Keep partial rewrites of a failing entry op
    #[arg(long)]
    no_rollback: bool,

    /// Log rewrite decisions to stderr
    #[arg(long)]
    verbose: bool,
}

fn parse_entry_op(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((op, attr)) if !op.is_empty() && !attr.is_empty() => {
            Ok((op.to_string(), attr.to_string()))
        }
        _ => Err(format!("expected OP=ATTR, got '{}'", s)),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rfa=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn load_options(cli: &Cli) -> Result<PassOptions, ProgramError> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text)?
        }
        None => PassOptions::default(),
    };
    if !cli.entry_op.is_empty() {
        options.entry_ops = cli.entry_op.iter().cloned().collect();
    }
    if cli.keep_going {
        options.keep_going = true;
    }
    if cli.no_rollback {
        options.transactional = false;
    }
    Ok(options)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), ProgramError> {
    match path {
        Some(path) => std::fs::write(path, text).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn render(emit: EmitFormat, graph: &Graph, library: &FunctionLibrary) -> Result<String, ProgramError> {
    match emit {
        EmitFormat::Json => Program::from_parts(graph, library).and_then(|p| p.to_json()),
        EmitFormat::Dot => rfa::dot::emit_program_dot(graph, library).map_err(ProgramError::from),
        EmitFormat::Summary => Ok(summary(graph, library)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // ── Load options and program ──
    let options = match load_options(&cli) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("rfa: error: {}", e);
            return ExitCode::from(2);
        }
    };
    let parts = Program::load(&cli.input).and_then(Program::into_parts);
    let (mut graph, mut library) = match parts {
        Ok(p) => p,
        Err(e) => {
            eprintln!("rfa: error: {}", e);
            return ExitCode::from(2);
        }
    };
    tracing::info!(
        input = %cli.input.display(),
        nodes = graph.num_nodes(),
        functions = library.len(),
        "loaded program"
    );

    // ── Run the pass ──
    let report = match RearrangePass::new(options).run(&mut graph, &mut library) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("rfa: error: {}", e);
            return ExitCode::from(1);
        }
    };
    for failure in &report.failures {
        eprintln!("rfa: error: {}: {}", failure.node, failure.error);
    }
    tracing::info!(
        entry_ops = report.entry_ops,
        rewritten = report.rewritten.len(),
        pruned = report.pruned.len(),
        "pass finished"
    );

    // ── Emit ──
    let written = match (cli.emit, cli.output.as_deref()) {
        (EmitFormat::Json, Some(path)) => {
            Program::from_parts(&graph, &library).and_then(|p| p.save(path))
        }
        (emit, path) => render(emit, &graph, &library).and_then(|mut t| {
            if !t.ends_with('\n') {
                t.push('\n');
            }
            write_output(path, &t)
        }),
    };
    if let Err(e) = written {
        eprintln!("rfa: error: {}", e);
        return ExitCode::from(2);
    }

    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
