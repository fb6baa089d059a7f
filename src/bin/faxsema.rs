// src/bin/faxsema.rs
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use fax_sema::ast::Program;
use fax_sema::diagnostics::Diagnostics;
use fax_sema::{git_commit_hash, Analyzer, VERSION};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "faxsema")]
#[command(version = VERSION)]
#[command(about = "Fax semantic analyzer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Disable colored output")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze parsed AST files and report semantic diagnostics
    #[command(arg_required_else_help = true)]
    Check {
        /// Input AST files (parser JSON output)
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Diagnostic output format
        #[arg(short, long, default_value = "human")]
        format: ReportFormat,

        /// Fax source file, for source-line carets in human output
        #[arg(long)]
        source: Option<PathBuf>,

        /// On success, print the annotated AST JSON to stdout
        #[arg(long)]
        emit_ast: bool,
    },

    /// Show analyzer version and build info
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReportFormat {
    Human,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Check { input, format, source, emit_ast } => {
            match check_files(&input, format, source.as_deref(), emit_ast) {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(e) => {
                    eprintln!("{} {}", "error:".red().bold(), e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Version => {
            show_version();
            ExitCode::SUCCESS
        }
    }
}

fn check_files(
    inputs: &[PathBuf],
    format: ReportFormat,
    source: Option<&std::path::Path>,
    emit_ast: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let source_text = match source {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };

    let mut all_clean = true;
    for input in inputs {
        let json = fs::read_to_string(input)?;
        let mut program = Program::from_json(&json)?;

        let diagnostics = Analyzer::new().analyze(&mut program)?;

        if diagnostics.is_empty() {
            eprintln!("{} {}", "✓".green(), input.display());
            if emit_ast {
                println!("{}", program.to_json()?);
            }
        } else {
            all_clean = false;
            eprintln!(
                "{} {}: {} error{}",
                "✗".red(),
                input.display(),
                diagnostics.len(),
                if diagnostics.len() == 1 { "" } else { "s" },
            );
            report(&diagnostics, format, source_text.as_deref());
        }
    }
    Ok(all_clean)
}

fn report(diagnostics: &Diagnostics, format: ReportFormat, source: Option<&str>) {
    match format {
        ReportFormat::Human => {
            for diagnostic in diagnostics.iter() {
                let header = format!("error[{}]", diagnostic.code);
                eprintln!(
                    "{}: {}",
                    header.as_str().red().bold(),
                    diagnostic.message.as_str().bold()
                );
                let rendered = diagnostic.render(source.unwrap_or(""));
                // The render already includes the header line.
                for line in rendered.lines().skip(1) {
                    eprintln!("{}", line);
                }
                eprintln!();
            }
        }
        ReportFormat::Json => match serde_json::to_string_pretty(diagnostics) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        },
    }
}

fn show_version() {
    println!("{} v{}", "faxsema".cyan().bold(), VERSION);
    println!("  commit: {}", git_commit_hash());
    println!("  pipeline: type check → ownership → lifetimes");
}
