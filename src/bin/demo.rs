//! xconf demo
//!
//! Runs a gray rollout end to end against an in-process store: two consumers
//! bind a typed configuration, a change goes to the gray consumer only, then
//! to everyone.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use xconf::{ActiveConfig, CancelScope, Config, ConfigEngine, File, MemStore};

/// xconf demo
#[derive(Parser, Debug)]
#[command(name = "xconf-demo")]
#[command(about = "Gray rollout walkthrough against an in-process store")]
#[command(version)]
struct Args {
    /// Namespace
    #[arg(short, long, default_value = "x")]
    namespace: String,

    /// Group of the demo file
    #[arg(short, long, default_value = "xconf")]
    group: String,

    /// Name of the demo file
    #[arg(long, default_value = "xconftest-test.json")]
    name: String,

    /// Cache directory (defaults to a fresh temp directory)
    #[arg(short, long)]
    cache_dir: Option<String>,

    /// Consumer that receives the gray revision
    #[arg(long, default_value = "client2")]
    gray: String,
}

#[derive(Debug, Deserialize)]
struct DemoConfig {
    #[allow(dead_code)]
    id: String,
    name: String,
    ppu: f32,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,xconf=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("xconf demo v{}", xconf::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> xconf::Result<()> {
    // Keep the temp dir alive for the whole run
    let temp = tempfile::TempDir::new()?;
    let cache_dir = args
        .cache_dir
        .clone()
        .map(Into::into)
        .unwrap_or_else(|| temp.path().to_path_buf());
    tracing::info!("Cache directory: {}", cache_dir.display());

    let store = Arc::new(MemStore::new());
    let open = |id: &str| {
        let config = Config::builder()
            .id(id)
            .namespace(&args.namespace)
            .cache_dir(cache_dir.join(id))
            .build();
        ConfigEngine::open(config, store.clone())
    };

    let admin = open("admin")?;
    let client1 = open("client1")?;
    let client2 = open(&args.gray)?;

    let mut file = File::new(
        &args.group,
        &args.name,
        &br#"{"id":"0001","name":"Cake","ppu":0.55}"#[..],
    );
    admin.create_file(&mut file)?;

    let scope = CancelScope::new();
    let holder1 = Arc::new(ActiveConfig::<DemoConfig>::new());
    let holder2 = Arc::new(ActiveConfig::<DemoConfig>::new());
    let watch1 = client1.bind_json(&args.group, &args.name, holder1.clone(), &scope)?;
    let watch2 = client2.bind_json(&args.group, &args.name, holder2.clone(), &scope)?;
    report("initial", &holder1, &holder2);

    // Gray revision: only the gray consumer picks it up
    file.content = Bytes::from_static(br#"{"id":"0001","name":"Cake2","ppu":0.60}"#);
    file.meta.gray = vec![args.gray.clone()];
    admin.update_file(&mut file)?;
    settle();
    report("gray", &holder1, &holder2);

    // General availability
    file.meta.gray.clear();
    admin.update_file(&mut file)?;
    settle();
    report("general", &holder1, &holder2);

    scope.cancel();
    for summary in [watch1.join(), watch2.join()] {
        tracing::info!("{:?}", summary);
    }
    Ok(())
}

fn settle() {
    std::thread::sleep(Duration::from_millis(100));
}

fn report(stage: &str, one: &ActiveConfig<DemoConfig>, two: &ActiveConfig<DemoConfig>) {
    let show = |holder: &ActiveConfig<DemoConfig>| {
        holder
            .current()
            .map(|c| format!("{} @ {}", c.name, c.ppu))
            .unwrap_or_else(|| "<none>".to_string())
    };
    println!("[{:>7}] client1: {:<14} gray consumer: {}", stage, show(one), show(two));
}
