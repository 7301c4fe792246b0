use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use showcaster::server;
use showcaster::settings;
use showcaster::state::AppState;
use showcaster::timeline;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "showcaster", about = "Live show cue broadcaster", version)]
struct Cli {
    /// Directory holding settings.json, projects, history and audio
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Listen port (overrides settings.json)
    #[arg(long)]
    port: Option<u16>,

    /// Listen address (overrides settings.json)
    #[arg(long)]
    bind: Option<String>,

    /// Milliseconds per clock tick
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Project file to open on startup
    #[arg(long)]
    project: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = settings::load_settings(&cli.data_dir);
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(ms) = cli.tick_ms {
        config.tick_interval_ms = ms;
    }
    if let Some(project) = cli.project {
        config.project_file = project;
    }
    config.resolve_paths(&cli.data_dir);

    let state = Arc::new(AppState::with_script_synth(config));
    log::info!(
        "Project '{}' loaded, clock at {}",
        state.with_project(|p| p.current_project_name()),
        state.clock.lock().counter()
    );

    tokio::spawn(timeline::run_clock(state.clone()));

    if let Err(e) = server::serve(state).await {
        log::error!("{e}");
        process::exit(1);
    }
}
