use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, WrapErr};
use safecalc::*;
use std::path::PathBuf;
use std::{
    fs,
    io::{self, BufRead, Write},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Show what went wrong instead of a bare `Error` in the calculator
    #[arg(long, global = true)]
    detailed_errors: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the tokens of an expression file
    Tokenize { filename: PathBuf },
    /// Print the syntax tree of an expression file
    Parse { filename: PathBuf },
    /// Evaluate a single expression
    Eval { expression: String },
    /// Interactive calculator
    Calc,
}

fn read_source(filename: &PathBuf) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading '{}' failed", filename.display()))
}

fn report(err: EvalError, source: &str) -> miette::Report {
    miette::Report::new(err).with_source_code(source.to_string())
}

fn main() -> miette::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tokenize { filename } => {
            let file_contents = read_source(&filename)?;

            for token in Lexer::new(&file_contents) {
                match token {
                    Ok(token) => println!("{token:?}"),
                    Err(err) => return Err(report(err, &file_contents)),
                }
            }
        }
        Commands::Parse { filename } => {
            let file_contents = read_source(&filename)?;

            let mut parser = parser::Parser::new(&file_contents);
            match parser.parse() {
                Ok(tree) => println!("{tree:#?}"),
                Err(err) => return Err(report(err, &file_contents)),
            }
        }
        Commands::Eval { expression } => {
            let expression = normalize(&expression);
            match evaluate(&expression) {
                Ok(value) => println!("{value}"),
                Err(err) => return Err(report(err, &expression)),
            }
        }
        Commands::Calc => {
            let errors = if cli.detailed_errors {
                ErrorDisplay::Detailed
            } else {
                ErrorDisplay::Generic
            };
            run_calculator(Session::new(errors))?;
        }
    }

    Ok(())
}

/// Reads lines of button labels and expression text. A word that is a
/// button label presses that button; anything else is typed in, with `=`
/// evaluating.
fn run_calculator(mut session: Session) -> miette::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("calc [{}]> ", session.display());
        io::stdout().flush().into_diagnostic()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.into_diagnostic()?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }

        for word in input.split_whitespace() {
            if let Some(key) = Key::from_label(word) {
                session.press(key);
                continue;
            }
            for c in word.chars() {
                match c {
                    '=' => session.press(Key::Equals),
                    c => session.type_text(c.encode_utf8(&mut [0; 4])),
                }
            }
        }

        println!("{}", session.display());
    }

    Ok(())
}
