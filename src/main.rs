use std::path::PathBuf;

use clap::Parser as ClapParser;
use log::LevelFilter;

use tinyback::diag::CompileError;
use tinyback::emit::TextWriterConfig;
use tinyback::{CompileOptions, LowerOptions, compile};

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listing to lower
    input: PathBuf,

    /// Output assembly file (defaults to INPUT with a .k91 extension)
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Skip peephole optimization
    #[clap(long)]
    no_opt: bool,

    /// Comma-separated list of things to dump: opt,liveness,regalloc,asm
    #[clap(long)]
    dump: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Width of the label column
    #[clap(long, default_value_t = 8)]
    label_width: usize,

    /// Width of the mnemonic column
    #[clap(long, default_value_t = 6)]
    mnemonic_width: usize,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn run(args: Args) -> Result<PathBuf, CompileError> {
    let source =
        std::fs::read_to_string(&args.input).map_err(|e| CompileError::Io(args.input.clone(), e))?;

    let opts = CompileOptions {
        dump: args.dump,
        lower: LowerOptions {
            optimize: !args.no_opt,
        },
        writer: TextWriterConfig {
            label_width: args.label_width,
            mnemonic_width: args.mnemonic_width,
        },
    };
    let asm = compile(&source, &opts)?;

    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("k91"));
    std::fs::write(&output, asm).map_err(|e| CompileError::Io(output.clone(), e))?;
    Ok(output)
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(output) => println!("[SUCCESS] assembly written to {}", output.display()),
        Err(e) => {
            eprintln!("[ERROR] {e}");
            std::process::exit(1);
        }
    }
}
