use clap::Parser;
use scenario_harness::scaffold;
use std::{path::PathBuf, process};

/// Seed starter scenario and fixture files from an action metadata file.
#[derive(Parser)]
#[command(name = "scaffold")]
struct Args {
    /// Path to the action metadata YAML file
    metadata: PathBuf,

    /// Directory the starter files are written into
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() {
    let args = Args::parse();

    match scaffold::generate(&args.metadata, &args.out_dir) {
        Ok(output) => {
            println!("wrote {}", output.scenario_file.display());
            println!("wrote {}", output.fixture_file.display());
        }
        Err(error) => {
            eprintln!("scaffold: {}", error);
            process::exit(1);
        }
    }
}
