use clap::Parser;
use meta_ads_mcp::config::{Cli, Config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_cli(cli);
    if let Err(err) = meta_ads_mcp::mcp::server::run_stdio(config).await {
        eprintln!("meta-ads-mcp: {}", err);
        std::process::exit(1);
    }
}
