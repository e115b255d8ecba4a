//! Standalone CLI for building an agent/standalone/cluster package archive
//! from a `BuildSpec` JSON document (spec §4.10), without going through the
//! server's HTTP surface.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_packager::{BuildSpec, PackageBuilder};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a BuildSpec JSON file. Reads from stdin when omitted.
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Output archive path.
    #[arg(short, long, default_value = "package.tar.gz")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let raw = match &args.spec {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading spec from stdin")?;
            buf
        }
    };

    let spec: BuildSpec = serde_json::from_str(&raw).context("parsing build spec")?;
    let archive = PackageBuilder::new().build(&spec).context("building package")?;

    std::fs::write(&args.output, &archive).with_context(|| format!("writing {}", args.output.display()))?;
    println!("wrote {} ({} bytes)", args.output.display(), archive.len());
    Ok(())
}
