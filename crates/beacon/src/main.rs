mod cli;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = cli::Cli::from_env();
    cli.execute().await?;

    // The console's stdin read sits on a blocking thread that would keep the
    // runtime from shutting down.
    std::process::exit(0);
}
