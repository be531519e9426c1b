use env_logger::Env;
use reel::{configuration::get_configuration, services::run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let stats = run(configuration).await?;
    log::info!(
        "Finished: {} scraped, {} failed, {} retries",
        stats.item_scraped_count,
        stats.failures(),
        stats.retry_count
    );

    Ok(())
}
