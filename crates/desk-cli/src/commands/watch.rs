use desk_core::config::EngineConfig;

use crate::commands::common::{open_engine, probe_network};
use crate::error::CliError;

/// Keep the engine running until Ctrl-C.
///
/// The health endpoint is polled to drive the connectivity gate, so queued
/// work drains as soon as the backend comes back.
pub async fn run_watch(config: &EngineConfig, metered: bool) -> Result<(), CliError> {
    let session = open_engine(config, true, metered).await?;
    let engine = session.engine;
    let network = session.network;

    let listener = engine.spawn_connectivity_listener(network.subscribe());
    let puller = engine.spawn_periodic_pull(config.pull_interval());

    let prober = {
        let engine = engine.clone();
        let interval = config.health_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = probe_network(engine.gateway(), metered).await;
                network.send_if_modified(|current| {
                    let changed = *current != status;
                    *current = status;
                    changed
                });
            }
        })
    };

    let mut states = engine.subscribe_state();
    println!("Watching {} (state: {})", config.api_base_url, engine.state().label());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                println!("state: {}", state.label());
            }
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    prober.abort();
    puller.abort();
    listener.abort();
    Ok(())
}
