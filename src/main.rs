use anyhow::Result;
use clap::Parser;
use corpus_search::{Cli, init_tracing, run};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli)
}
