//! BNPL Engine CLI
//!
//! A streaming operation processor that reads a CSV of plan operations and
//! outputs final installment states, or per-merchant dashboard metrics.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > installments.csv
//! cargo run -- operations.csv --dashboard > dashboard.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use bnpl_engine::{EngineError, PlanEngine, Result};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(EngineError::MissingArgument);
    }

    let input_path = &args[1];
    let mut dashboard = false;
    for arg in &args[2..] {
        match arg.as_str() {
            "--dashboard" => dashboard = true,
            other => return Err(EngineError::UnknownArgument(other.to_string())),
        }
    }

    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let mut engine = PlanEngine::new();
    engine.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    if dashboard {
        engine.write_dashboard(handle)?;
    } else {
        engine.write_output(handle)?;
    }

    Ok(())
}
