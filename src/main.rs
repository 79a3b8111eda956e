use handpose_quiz::config::Config;
use handpose_quiz::logging::{init_tracing, LogConfig};
use handpose_quiz::replay::{self, ReplayOptions};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!("Starting handpose-quiz replay");

    let pool = config.load_pool().expect("Failed to load question pool");
    let recording =
        replay::load_recording(&config.replay.path).expect("Failed to load replay recording");

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(8);
    tokio::spawn(forward_shutdown(shutdown_tx.clone()));

    let options = ReplayOptions::from_config(&config);
    match replay::run(config.game_settings(), pool, recording, options, shutdown_rx).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "Failed to serialize replay summary"),
        },
        Err(e) => {
            tracing::error!(error = %e, "Replay failed");
            std::process::exit(1);
        }
    }

    tracing::info!("Shutdown complete");
}

/// 等到 ctrl-c 或（unix 上的）SIGTERM，返回收到的信号名
async fn wait_for_termination() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "ctrl-c",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
                "ctrl-c"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}

async fn forward_shutdown(replay_stop: broadcast::Sender<()>) {
    let signal = wait_for_termination().await;
    tracing::info!(signal, "Stopping replay");
    // 回放已自行结束时没有接收端，发送失败无妨
    let _ = replay_stop.send(());
}
