//! Terminal client for the relay core: runs one session against the configured
//! feed and prints every event as it would appear on the wire. Ctrl-C stops it.

use hn_delta_relay::{api::AppState, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = RelayConfig::load_default()?;
    let state = AppState::from_config(&cfg);
    let mut session = state.sessions.open();

    loop {
        tokio::select! {
            ev = session.events.recv() => {
                let Some(ev) = ev else { break };
                if let Some(id) = ev.id {
                    println!("id: {id}");
                }
                println!("event: {}\ndata: {}\n", ev.kind.as_str(), ev.data);
            }
            _ = tokio::signal::ctrl_c() => {
                state.sessions.shutdown();
                break;
            }
        }
    }

    session.task.await?;
    println!("relay-tail done (seen {} ids)", state.seen.len());
    Ok(())
}
