use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::LevelFilter;
use ts2c_codegen::CodegenOptions;
use ts2c_driver::{compile_file, output_path, CompileOptions};

#[derive(Parser, Debug)]
#[command(name = "ts2c", about = "ts2c: TypeScript to C compiler")]
struct Cli {
    /// Input TypeScript file to compile.
    input: PathBuf,

    /// Output file path. Defaults to the input with a `.c` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the generated C to stdout instead of writing a file.
    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    /// Import specifiers starting with this prefix become `#include`s.
    #[arg(long, default_value = "ts2c-target")]
    include_marker: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose > 0 {
        let level = match verbose {
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        builder.filter_level(level);
    }
    builder.init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.input.exists() {
        eprintln!("error: file not found: {}", cli.input.display());
        process::exit(1);
    }

    let options = CompileOptions {
        output: cli.output,
        to_stdout: cli.stdout,
        codegen: CodegenOptions {
            include_marker: cli.include_marker,
        },
    };

    match compile_file(&cli.input, &options) {
        Ok(c_text) => match output_path(&cli.input, &options) {
            Some(output) => eprintln!("compiled to {}", output.display()),
            None => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = stdout.write_all(c_text.as_bytes()) {
                    eprintln!("error: {e}");
                    process::exit(1);
                }
            }
        },
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
