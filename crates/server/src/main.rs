use clap::Parser as _;
use server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Err(e) if !e.not_found() => return Err(e.into()),
        _ => {}
    }
    let config = Config::parse();
    server::init_tracing();
    if let Err(e) = server::run(config).await {
        tracing::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
