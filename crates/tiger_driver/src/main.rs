use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{CommandFactory, Parser as _, Subcommand};
use clap_complete::Shell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tiger_ast::Program;
use tiger_frame::X64Frame;
use tiger_lexer::{Lexer, Span};
use tiger_parser::Parser;
use tiger_semant::{Options, Translation};
use tracing_subscriber::EnvFilter;

/// Tiger semantic analyzer and IR translator
#[derive(clap::Parser, Debug)]
#[command(name = "tiger", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Keep every variable in memory instead of computing escapes
    #[arg(long, global = true)]
    no_escape_analysis: bool,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show lexer output (tokens)
    Lex { file: PathBuf },
    /// Show parser output (AST)
    Parse { file: PathBuf },
    /// Type check and report diagnostics
    Check { file: PathBuf },
    /// Show the IR fragments
    Ir { file: PathBuf },
    /// Print a shell completion script
    Completions { shell: Shell },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = Options {
        escape_analysis: !cli.no_escape_analysis,
    };

    match &cli.command {
        Command::Lex { file } => with_source(file, run_lexer),
        Command::Parse { file } => with_source(file, run_parser),
        Command::Check { file } => with_source(file, |path, source| run_check(path, source, &options)),
        Command::Ir { file } => with_source(file, |path, source| run_ir(path, source, &options)),
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "tiger", &mut std::io::stdout());
            ExitCode::SUCCESS
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn with_source(path: &Path, run: impl FnOnce(&str, &str) -> ExitCode) -> ExitCode {
    let name = path.display().to_string();
    match fs::read_to_string(path) {
        Ok(source) => {
            tracing::debug!(path = %name, bytes = source.len(), "read source");
            run(&name, &source)
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", name, e);
            ExitCode::FAILURE
        }
    }
}

// === Commands ===

fn run_lexer(path: &str, source: &str) -> ExitCode {
    println!("=== Lexer Output for {} ===\n", path);

    let tokens = match Lexer::tokenize(source) {
        Ok(tokens) => tokens,
        Err(e) => {
            report(path, source, "Lex error", &e.message, e.span);
            return ExitCode::FAILURE;
        }
    };

    println!("{:<12} {}", "SPAN", "TOKEN");
    println!("{}", "-".repeat(40));
    for spanned in &tokens {
        let span = format!("{}..{}", spanned.span.start, spanned.span.end);
        println!("{:<12} {}", span, spanned.token);
    }
    println!("\nTotal tokens: {}", tokens.len());
    ExitCode::SUCCESS
}

fn run_parser(path: &str, source: &str) -> ExitCode {
    println!("=== Parser Output for {} ===\n", path);

    match parse(path, source) {
        Some(program) => {
            print!("{}", program.pretty_print(0));
            ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
    }
}

fn run_check(path: &str, source: &str, options: &Options) -> ExitCode {
    println!("=== Type Check for {} ===\n", path);

    let Some(translation) = analyze(path, source, options) else {
        return ExitCode::FAILURE;
    };
    println!("Program type: {}", translation.types.display(translation.ty));
    println!("Type checking successful!");
    ExitCode::SUCCESS
}

fn run_ir(path: &str, source: &str, options: &Options) -> ExitCode {
    println!("=== IR for {} ===\n", path);

    let Some(translation) = analyze(path, source, options) else {
        return ExitCode::FAILURE;
    };
    for fragment in &translation.fragments {
        println!("{}", fragment.pretty_print());
    }
    ExitCode::SUCCESS
}

// === Pipeline ===

fn parse(path: &str, source: &str) -> Option<Program> {
    match Parser::parse(source) {
        Ok(program) => Some(program),
        Err(e) => {
            tracing::debug!(start = e.span.start, end = e.span.end, "parse failed");
            report(path, source, "Parse error", &e.message, e.span);
            None
        }
    }
}

/// Parse and translate, reporting every diagnostic. `None` if anything
/// went wrong.
fn analyze(path: &str, source: &str, options: &Options) -> Option<Translation<X64Frame>> {
    let program = parse(path, source)?;
    tracing::debug!(escape_analysis = options.escape_analysis, "translating");
    let translation = tiger_semant::translate::<X64Frame>(&program, options);
    if translation.is_ok() {
        return Some(translation);
    }
    for diagnostic in &translation.diagnostics {
        report(path, source, "Semantic error", &diagnostic.kind.to_string(), diagnostic.span);
    }
    eprintln!("{} error(s) found", translation.diagnostics.len());
    None
}

fn report(path: &str, source: &str, title: &str, message: &str, span: Span) {
    let id = path.to_string();
    let result = Report::build(ReportKind::Error, id.clone(), span.start)
        .with_message(title)
        .with_label(
            Label::new((id.clone(), span.start..span.end))
                .with_message(message)
                .with_color(Color::Red),
        )
        .finish()
        .eprint((id, Source::from(source)));
    if let Err(e) = result {
        eprintln!("{} at {}..{}: {} ({})", title, span.start, span.end, message, e);
    }
}
