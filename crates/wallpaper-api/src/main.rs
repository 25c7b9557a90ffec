use wallpaper_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router, scheduler) = wallpaper_api::setup::initialize_app(config.clone()).await?;

    wallpaper_api::setup::server::start_server(&config, router, state, scheduler).await?;

    Ok(())
}
