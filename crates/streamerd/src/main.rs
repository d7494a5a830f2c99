//! `streamerd`: the daemon binary wiring `ControlServer` and a carousel
//! `CarouselHost` together behind one set of CLI flags and one `tracing`
//! subscriber.

mod collaborators;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use streamer_carousel::{CarouselHost, ObjectCacheSink, SectionFeed};
use streamer_control::{BASE_PORT, ControlServer, Credentials};
use tracing::info;
use tracing_subscriber::EnvFilter;

use collaborators::StandaloneCollaborators;

/// CLI configuration (§2.3): deliberately thin, matching the core spec's
/// explicit exclusion of config-file reload and credential hot-reload.
#[derive(Debug, Parser)]
#[command(name = "streamerd", about = "Control and carousel-download daemon")]
struct Args {
    /// DVB adapter index; the control port is `54197 + adapter`.
    #[arg(long, default_value_t = 0)]
    adapter: u16,

    /// Streamer name reported by the INFO opcode's NAME subfield.
    #[arg(long, default_value = "streamer")]
    name: String,

    #[arg(long, default_value = "admin")]
    username: String,

    #[arg(long, default_value = "")]
    password: String,

    /// Maximum concurrent control connections (`N_MAX`).
    #[arg(long, default_value_t = 8)]
    max_connections: usize,

    /// Overrides the bind address entirely (`host:port`); tests use this to
    /// avoid the fixed port-per-adapter scheme.
    #[arg(long)]
    bind: Option<String>,
}

struct LoggingObjectCacheSink;

impl ObjectCacheSink for LoggingObjectCacheSink {
    fn store_module(&self, carousel_id: u32, module_id: u16, data: Vec<u8>) {
        info!(carousel_id, module_id, bytes = data.len(), "carousel module assembled");
    }
}

struct LoggingSectionFeed;

impl SectionFeed for LoggingSectionFeed {
    fn attach(&self, carousel_id: u32, assoc_tag: u16) {
        info!(carousel_id, assoc_tag, "PID filter attach requested");
    }
}

/// One raw PSI section handed to the carousel worker, tagged with the
/// carousel id the (external, out-of-scope) section filter was attached
/// for.
struct CarouselSection {
    data: Vec<u8>,
    carousel_id: u32,
}

fn init_logging() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
}

fn bind_addr(args: &Args) -> SocketAddr {
    if let Some(bind) = &args.bind {
        return bind.parse().expect("--bind must be a valid host:port");
    }
    let port = BASE_PORT + args.adapter;
    SocketAddr::from(([0, 0, 0, 0], port))
}

fn main() {
    let args = Args::parse();
    init_logging();

    let addr = bind_addr(&args);
    let credentials = Credentials { username: args.username.clone(), password: args.password.clone() };
    let collaborators = Arc::new(StandaloneCollaborators::new());
    let server =
        Arc::new(ControlServer::new(args.name.clone(), credentials, args.max_connections, collaborators));

    ctrlc::set_handler({
        let server = Arc::clone(&server);
        move || {
            info!("shutdown signal received");
            server.shutdown();
        }
    })
    .expect("failed to install ctrl-c handler");

    let (section_tx, section_rx) = mpsc::channel::<CarouselSection>();
    let carousel_worker = thread::Builder::new()
        .name("carousel-worker".into())
        .spawn(move || carousel_worker_loop(section_rx))
        .expect("failed to spawn carousel worker thread");

    info!(%addr, name = %args.name, "streamerd starting");
    if let Err(e) = server.run(addr) {
        tracing::error!(error = %e, "control server exited with error");
    }

    // Dropping the sender lets the carousel worker's recv loop end; a real
    // demux layer holding a clone of `section_tx` would feed it sections for
    // as long as the daemon runs instead.
    drop(section_tx);
    let _ = carousel_worker.join();
}

fn carousel_worker_loop(section_rx: mpsc::Receiver<CarouselSection>) {
    let mut host = CarouselHost::new(Arc::new(LoggingObjectCacheSink));
    let feed = LoggingSectionFeed;

    for section in section_rx {
        host.process_section(&section.data, section.carousel_id);
        if host.has_pending_subscriptions() {
            host.resolve_subscriptions(&feed);
        }
    }
}
