use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod compiler;

/// Compiles a stack-VM source file to a bytecode image.
#[derive(Parser)]
#[command(name = "stackvmc")]
#[command(about = "Bootstrap compiler for the stack-oriented VM language", long_about = None)]
struct Cli {
    /// Source file to compile
    input: PathBuf,
    /// Path to write the compiled byte image to
    output: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let original_cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    // Resolve `output` against the original cwd before the chdir below can
    // change what a relative path means.
    let output = if cli.output.is_absolute() {
        cli.output.clone()
    } else {
        original_cwd.join(&cli.output)
    };

    let input = match cli.input.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: reading '{}': {}", cli.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    // §6.1: the driver changes its working directory to the input file's
    // parent before compiling, so relative `import` paths resolve the same
    // way regardless of where `stackvmc` itself was invoked from.
    if let Some(dir) = input.parent() {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("error: changing directory to '{}': {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let entry = PathBuf::from(input.file_name().unwrap_or(input.as_os_str()));

    let image = match compiler::compile_file(&entry) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::write(&output, &image) {
        eprintln!("error: writing '{}': {}", output.display(), e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
