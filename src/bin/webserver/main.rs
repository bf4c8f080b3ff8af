#![forbid(unsafe_code)]

use std::{net::SocketAddr, sync::Arc};

use bass_bash::{
    session::SystemClock,
    web::{self, AppState},
    Config,
};
use eyre::WrapErr;
use log::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init_timed();

    let config = Config::load().wrap_err("Could not load config")?;
    let addr = SocketAddr::new(config.address, config.port);
    info!("Running the {} tournament", config.variant);

    let state =
        AppState::new(config, Arc::new(SystemClock)).wrap_err("Could not set up web app")?;

    let (addr, server) = warp::serve(web::routes(state))
        .try_bind_with_graceful_shutdown(addr, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .wrap_err_with(|| format!("Could not bind to {addr}"))?;
    info!("Listening on http://{addr}");
    server.await;

    Ok(())
}
