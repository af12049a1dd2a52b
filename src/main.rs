use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tabstat::context::SessionContext;
use tabstat::ops;
use tabstat::render::{ChartRenderer, RenderConfig};

#[derive(Parser, Debug)]
#[command(name = "tabstat")]
#[command(about = "Deterministic statistics and charts over a CSV dataset", long_about = None)]
struct Args {
    /// CSV file to analyze
    #[arg(long)]
    data: PathBuf,

    /// Directory chart files are written into
    #[arg(long, default_value = "plots")]
    plots_dir: PathBuf,

    /// Chart width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Chart height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Column name to type mapping
    Schema {
        /// Empty for all columns, a count for the first N, or a name list
        #[arg(default_value = "")]
        selector: String,
    },
    /// Missing-value counts per column
    Nulls,
    /// Summary statistics for numeric columns
    Describe {
        /// Empty for all columns, a count for the first N, or a name list
        #[arg(default_value = "")]
        selector: String,
    },
    /// Deep profile of a single column
    Profile {
        /// Column name, or a JSON object with a "column" key
        params: String,
    },
    /// Outlier scan over one numeric column
    Outliers {
        /// JSON parameters (column, method)
        params: String,
    },
    /// Pairwise correlation matrix
    Correlation {
        /// JSON parameters (columns, method)
        #[arg(default_value = "{}")]
        params: String,
    },
    /// Value distribution of a categorical column
    Distribution {
        /// JSON parameters (column, top_k)
        params: String,
    },
    /// Render a chart and summarize the plotted data
    Plot {
        /// JSON parameters (plot_type, x, y, hue, columns, title)
        #[arg(default_value = "")]
        params: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut ctx = SessionContext::new();
    ctx.load_csv(&args.data)
        .with_context(|| format!("Failed to load dataset from {}", args.data.display()))?;

    let renderer = ChartRenderer::new(RenderConfig {
        width: args.width,
        height: args.height,
        output_dir: args.plots_dir,
    });

    let (op, payload) = match &args.command {
        Command::Schema { selector } => ("schema", selector.as_str()),
        Command::Nulls => ("nulls", ""),
        Command::Describe { selector } => ("describe", selector.as_str()),
        Command::Profile { params } => ("profile", params.as_str()),
        Command::Outliers { params } => ("outliers", params.as_str()),
        Command::Correlation { params } => ("correlation", params.as_str()),
        Command::Distribution { params } => ("distribution", params.as_str()),
        Command::Plot { params } => ("plot", params.as_str()),
    };

    // Operation failures are part of the protocol: they print as an error
    // envelope on stdout, not as a crash.
    let message = match ops::dispatch(&ctx, &renderer, op, payload) {
        Ok(report) => report.into_message(),
        Err(error) => error.into_message(),
    };
    println!("{}", message);

    Ok(())
}
