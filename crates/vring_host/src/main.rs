//! Throughput comparison between the software and mirrored rings.

#[cfg(target_os = "linux")]
mod bytes;
mod report;
mod throughput;
#[cfg(target_os = "linux")]
mod typed;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(about = "Compare software and mirrored ring buffer throughput")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Indexed u32 access: sequential and wraparound writes and reads.
    Typed {
        /// Element counts to benchmark.
        #[arg(long, value_delimiter = ',', default_values_t = [4096, 65_536, 524_288, 4_194_304])]
        counts: Vec<usize>,
        /// Timed runs per case; the best one is reported.
        #[arg(long, default_value_t = 100)]
        iters: usize,
        /// Print a CSV table after the per-case report.
        #[arg(long)]
        csv: bool,
    },
    /// 32-byte record push/pop: sequential and wraparound.
    Bytes {
        /// Ring sizes in bytes.
        #[arg(long, value_delimiter = ',', default_values_t = [4096, 65_536, 524_288, 4_194_304, 16_777_216])]
        sizes: Vec<usize>,
        #[arg(long, default_value_t = 100)]
        iters: usize,
        #[arg(long)]
        csv: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    run(cli.command)
}

#[cfg(target_os = "linux")]
fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Typed { counts, iters, csv } => {
            let reports = typed::run_typed(&counts, iters)?;
            if csv {
                report::print_csv("count", &reports);
            }
        }
        Commands::Bytes { sizes, iters, csv } => {
            let reports = bytes::run_bytes(&sizes, iters)?;
            if csv {
                report::print_csv("bytes", &reports);
            }
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_command: Commands) -> Result<()> {
    anyhow::bail!("mirrored rings need memfd_create, which this platform lacks")
}
