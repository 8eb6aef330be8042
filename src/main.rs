use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payflow::interfaces::csv::instruction_reader::InstructionReader;
use payflow::interfaces::csv::report_writer::ReportWriter;
use payflow::interfaces::driver::SimulationDriver;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input instructions CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut driver = build_driver(&cli).into_diagnostic()?;

    // Process instructions
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = InstructionReader::new(file);
    for instruction_result in reader.instructions() {
        match instruction_result {
            Ok(instruction) => {
                if let Err(e) = driver.apply(&instruction).await {
                    eprintln!("Error processing instruction: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading instruction: {}", e);
            }
        }
    }

    // Output final workflow states
    let rows = driver.report().await.into_diagnostic()?;
    let stdout = io::stdout();
    ReportWriter::new(stdout.lock())
        .write_rows(rows)
        .into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn build_driver(cli: &Cli) -> payflow::Result<SimulationDriver> {
    use payflow::infrastructure::in_memory::InMemoryWorkflowStore;
    use payflow::infrastructure::rocksdb::RocksDbWorkflowStore;

    let driver = if let Some(db_path) = &cli.db_path {
        SimulationDriver::new(Box::new(RocksDbWorkflowStore::open(db_path)?))
    } else {
        SimulationDriver::new(Box::new(InMemoryWorkflowStore::new()))
    };
    Ok(driver)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_driver(_cli: &Cli) -> payflow::Result<SimulationDriver> {
    use payflow::infrastructure::in_memory::InMemoryWorkflowStore;

    Ok(SimulationDriver::new(Box::new(InMemoryWorkflowStore::new())))
}
