//! furnacec - a single-pass compiler for a small C-like language, emitting
//! bytecode for an external stack-oriented virtual machine.

use std::fs;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use log::info;

use furnace_compiler::compiler::Compiler;
use furnace_compiler::error::DriverError;
use furnace_compiler::lexer::Lexer;
use furnace_compiler::parser::Parser;

/// Compile a source file to bytecode.
#[derive(ClapParser, Debug)]
#[command(name = "furnacec", version, about)]
struct Cli {
    /// Path to the source file.
    input: String,

    /// Where to write the compiled bytecode image.
    #[arg(short = 'o', long, default_value = "out")]
    output: String,

    /// Print the token stream and exit.
    #[arg(long)]
    tokens: bool,

    /// Print the parsed AST and exit.
    #[arg(long)]
    ast: bool,

    /// Print the raw bytecode image bytes and exit, without writing `output`.
    #[arg(long)]
    bytecode: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> Result<bool, DriverError> {
    let source = fs::read_to_string(&cli.input).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DriverError::FailedToOpen(cli.input.clone())
        } else {
            DriverError::Io(e)
        }
    })?;

    let tokens = Lexer::new(&source).tokenize();
    if cli.tokens {
        for t in &tokens {
            println!("{:>4}:{:<3} {:?}", t.line, t.column, t.token);
        }
        return Ok(true);
    }

    let mut parser = Parser::new(tokens);
    let program = parser.parse();
    for e in parser.errors() {
        eprintln!("error: {e}");
    }

    if cli.ast {
        for stmt in &program {
            println!("{stmt:#?}");
        }
        return Ok(!parser.has_errors());
    }

    let output = Compiler::new().compile(&program);

    for e in &output.errors {
        eprintln!("error: {e}");
    }

    if cli.bytecode {
        println!("{} bytes:", output.image.len());
        for chunk in output.image.chunks(16) {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            println!("  {}", hex.join(" "));
        }
        return Ok(!parser.has_errors() && !output.has_errors);
    }

    // The image is written even when parsing or codegen reported errors: a
    // partial/invalid image is still useful for inspection, and callers
    // check the exit code rather than the presence of the file.
    let mut file = fs::File::create(&cli.output)?;
    file.write_all(&output.image)?;
    info!("wrote {} bytes to {}", output.image.len(), cli.output);

    Ok(!parser.has_errors() && !output.has_errors)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
