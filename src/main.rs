//! distmm command-line driver.
//!
//! With the local backend every node runs as a thread of this process:
//! ```sh
//! distmm --rows 1000 --cols 1000 --nodes 4
//! ```
//! With the fs backend start one process per node, each with its own
//! `DISTMM_NODE_ID` and the same `DISTMM_MEMBERS` and `DISTMM_STORE_DIR`:
//! ```sh
//! DISTMM_BACKEND=fs DISTMM_STORE_DIR=/shared DISTMM_MEMBERS=a,b DISTMM_NODE_ID=a distmm
//! ```

use clap::Parser;
use distmm::{Backend, Config, JobSpec, LocalCluster, Matrix, NodeBuilder};

#[derive(Parser)]
#[command(name = "distmm")]
#[command(about = "Distributed dense matrix multiplication over a shared store")]
#[command(version)]
struct Cli {
    /// Rows of the left operand.
    #[arg(long, default_value_t = 1000)]
    rows: usize,
    /// Columns of the left operand (rows of the right operand).
    #[arg(long, default_value_t = 1000)]
    cols: usize,
    /// Columns of the right operand, defaults to `--cols`.
    #[arg(long)]
    b_cols: Option<usize>,
    /// Rows per chunk (overrides DISTMM_CHUNK_HEIGHT).
    #[arg(long)]
    chunk_height: Option<usize>,
    /// Seed for operand generation (overrides DISTMM_SEED).
    #[arg(long)]
    seed: Option<u64>,
    /// Number of in-process nodes, local backend only.
    #[arg(long, default_value_t = 2)]
    nodes: usize,
    /// Rows and columns of the result to print.
    #[arg(long, default_value_t = 10)]
    preview: usize,
    /// Log level used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn setup_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_result(result: &Matrix<i64>, preview: usize) {
    println!("Final Result (Partial View):");
    println!("{}", result.preview(preview, preview));
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let mut config = Config::from_env()?;
    if let Some(chunk_height) = cli.chunk_height {
        config.chunk_height = chunk_height;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    let job = JobSpec::new(cli.rows, cli.cols, cli.b_cols.unwrap_or(cli.cols));

    match Backend::from_name(&config.backend)? {
        Backend::Local => {
            let cluster = LocalCluster::with_config(cli.nodes, config)?;
            let outcome = cluster.run::<i64>(&job)?;
            for (node, ordinals) in &outcome.computed_by {
                tracing::info!(%node, chunks = ?ordinals, "node finished");
            }
            print_result(&outcome.result, cli.preview);
        }
        Backend::Fs => {
            let node = NodeBuilder::with_config(config).build()?;
            let outcome = node.run::<i64>(&job)?;
            match outcome.result {
                Some(result) => print_result(&result, cli.preview),
                None => println!(
                    "Worker {} finished, computed {} chunk(s)",
                    node.id(),
                    outcome.computed.len()
                ),
            }
        }
    }
    Ok(())
}
