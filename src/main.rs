use std::sync::Arc;

use agent_desk::bridge;
use agent_desk::config::{BridgeConfig, DeskConfig};
use agent_desk::routing::{HttpRoutingGateway, RoutingGateway};
use agent_desk::session::{LoggingBinder, SessionDeps, WorkerSession};

const USAGE: &str = "usage: agent-desk bridge | agent-desk agent <workerId> [displayName] [threadId]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("bridge") => run_bridge().await,
        Some("agent") => {
            let Some(worker_id) = args.get(1) else {
                anyhow::bail!(USAGE);
            };
            let display_name = args.get(2).cloned().unwrap_or_else(|| "Agent".to_string());
            let thread_id = args.get(3).cloned();
            run_agent(worker_id, &display_name, thread_id).await
        }
        _ => anyhow::bail!(USAGE),
    }
}

async fn run_bridge() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env()?;

    eprintln!("Agent Desk bridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://0.0.0.0:{}", config.port);
    eprintln!("   Job router: {}", config.router_endpoint);
    eprintln!("   Queue: {}", config.worker_profile.queue_id);

    bridge::serve(config).await?;
    Ok(())
}

/// Headless session: register, wait, accept the first offer, deregister.
async fn run_agent(
    worker_id: &str,
    display_name: &str,
    thread_id: Option<String>,
) -> anyhow::Result<()> {
    let config = DeskConfig::from_env()?;

    eprintln!("Agent Desk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Gateway: {}", config.gateway_url);
    eprintln!("   Worker: {} ({})", worker_id, display_name);

    let gateway: Arc<dyn RoutingGateway> = Arc::new(HttpRoutingGateway::from_config(&config)?);
    let deps = SessionDeps::new(gateway, &config, Arc::new(LoggingBinder));
    let mut session = WorkerSession::new(deps, worker_id, display_name, thread_id);

    session.start().await?;
    eprintln!("   Registered, waiting for job offers...");

    loop {
        session.start_waiting().await?;

        let offers = tokio::select! {
            offers = session.next_offers() => offers,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("   Interrupted");
                break;
            }
        };

        let Some(offers) = offers else {
            eprintln!("   No offers before polling gave up");
            break;
        };

        let Some(offer) = offers.first() else {
            continue;
        };
        eprintln!("   Accepting offer {} for job {}", offer.offer_id, offer.job_id);

        match session.accept(&offer.offer_id).await {
            Ok(outcome) => {
                match outcome.thread_id() {
                    Some(thread_id) => eprintln!("   Joined chat thread {thread_id}"),
                    None => eprintln!("   Job accepted, but it carries no chat thread"),
                }
                break;
            }
            Err(e) => {
                eprintln!("   Could not accept offer: {e}. Polling again.");
            }
        }
    }

    session.end().await;
    Ok(())
}
