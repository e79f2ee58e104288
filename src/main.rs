use color_eyre::eyre::eyre;
use tracing::{error, info};

use kurve_sync::config::{load_config, CONFIG_FILE};
use kurve_sync::{fields, logger, session};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = load_config(&config_path);
    logger::init_from_config(&config.tracing);

    info!(
        { fields::CONFIG_SOURCE } = config_path.as_str(),
        { fields::PLAYER_COUNT } = config.players,
        { fields::DELAY_TICKS } = config.delay_ticks,
        { fields::TICK_RATE_HZ } = config.tick_rate_hz,
        tracing_format = config.tracing.format.as_str(),
        tracing_level = config.tracing.level.as_str(),
        "Configuration loaded"
    );

    let report = session::run_local_match(&config)
        .await
        .map_err(|e| eyre!("{:#}", e))?;

    if !report.consistent {
        error!("Match finished with diverging inputs");
        return Err(eyre!("players resolved different inputs"));
    }
    info!(ticks = report.ticks_played, "Match finished in lockstep");
    Ok(())
}
