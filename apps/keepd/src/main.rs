mod conn;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use keepcore::abilities::Catalog;
use keepcore::actor::{StarterKit, actor_key};
use keepcore::rng::Rng64;
use keepcore::rooms::Rooms;
use keepcore::shard::{SessionId, Shard, ShardConfig, WorldReq};
use keepcore::store::JsonDirStore;
use keepcore::world::World;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

fn usage_and_exit() -> ! {
    eprintln!(
        "keepd\n\n\
USAGE:\n  keepd [--bind HOST:PORT]\n\n\
ENV:\n  KEEP_BIND               default 127.0.0.1:4000\n  KEEP_PLAYER_DIR         default var/players\n  KEEP_AREA_FILE          optional YAML area (default: built-in Lanternhollow)\n  WORLD_SEED              default 1\n  KEEP_AUTOSAVE_S         default 300 (min 5)\n  KEEP_DEFAULT_KIT        default wanderer (scholar, warrior, wanderer)\n  KEEP_BOOTSTRAP_KEEPERS  comma-separated names created as keepers (new characters only)\n"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    bind: SocketAddr,
    player_dir: PathBuf,
    area_file: Option<PathBuf>,
    world_seed: u64,
    autosave_s: u64,
    default_kit: String,
    bootstrap_keepers: Vec<String>,
}

fn parse_args() -> Config {
    let mut bind: SocketAddr = std::env::var("KEEP_BIND")
        .unwrap_or_else(|_| "127.0.0.1:4000".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());

    let player_dir: PathBuf = std::env::var("KEEP_PLAYER_DIR")
        .unwrap_or_else(|_| "var/players".to_string())
        .into();
    let area_file: Option<PathBuf> = std::env::var("KEEP_AREA_FILE")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let world_seed: u64 = std::env::var("WORLD_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let autosave_s: u64 = std::env::var("KEEP_AUTOSAVE_S")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300)
        .max(5);
    let default_kit = std::env::var("KEEP_DEFAULT_KIT").unwrap_or_else(|_| "wanderer".to_string());
    let bootstrap_keepers: Vec<String> = std::env::var("KEEP_BOOTSTRAP_KEEPERS")
        .ok()
        .map(|v| {
            v.split(',')
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--bind" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        bind,
        player_dir,
        area_file,
        world_seed,
        autosave_s,
        default_kit,
        bootstrap_keepers,
    }
}

/// The filter alone decides what gets logged, so `RUST_LOG=keepcore=debug` works.
fn log_subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log_subscriber(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,keepd=info,keepcore=info".into()),
    )
    .init();

    let cfg = parse_args();

    let rooms = match &cfg.area_file {
        Some(p) => Rooms::load_file(p).with_context(|| format!("load area {}", p.display()))?,
        None => Rooms::embedded().context("load built-in area")?,
    };
    let kit = StarterKit::find(&cfg.default_kit).with_context(|| {
        format!(
            "unknown KEEP_DEFAULT_KIT {:?} (known: {})",
            cfg.default_kit,
            StarterKit::ids().collect::<Vec<_>>().join(", ")
        )
    })?;

    let world = World::new(
        rooms,
        Catalog::builtin(),
        Box::new(Rng64::from_seed(cfg.world_seed)),
    );
    let shard = Shard::new(
        world,
        Box::new(JsonDirStore::new(cfg.player_dir.clone())),
        ShardConfig {
            kit,
            bootstrap_keepers: cfg
                .bootstrap_keepers
                .iter()
                .map(|n| actor_key(n))
                .collect::<HashSet<_>>(),
        },
    );

    let (world_tx, world_rx) = mpsc::channel::<WorldReq>(4096);
    let world_task = tokio::spawn(shard.run(world_rx, Duration::from_secs(cfg.autosave_s)));

    let listener = TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    info!(
        bind = %cfg.bind,
        player_dir = %cfg.player_dir.display(),
        seed = cfg.world_seed,
        autosave_s = cfg.autosave_s,
        kit = kit.id,
        "keepd listening"
    );

    let mut next_session = 0u64;
    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(x) => x,
                    Err(e) => {
                        warn!(err = %e, "accept failed");
                        continue;
                    }
                };
                next_session += 1;
                let session = SessionId(next_session);
                let tx = world_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = conn::handle_conn(stream, peer, session, tx).await {
                        warn!(peer = %peer, session = %session, err = %e, "connection ended with error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    let _ = world_tx.send(WorldReq::Shutdown).await;
    drop(world_tx);
    world_task.await.context("world task")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_filter_can_turn_on_debug() {
        let sub = log_subscriber(EnvFilter::new("debug"));
        tracing::subscriber::with_default(sub, || {
            assert!(tracing::enabled!(tracing::Level::DEBUG));
        });
        let sub = log_subscriber(EnvFilter::new("warn"));
        tracing::subscriber::with_default(sub, || {
            assert!(!tracing::enabled!(tracing::Level::INFO));
        });
    }
}
