use tail_engine::{TailHandle, TailSession, TailState};
use tail_transport::build_factory;
use tokio::sync::mpsc;

use crate::config::{EffectiveTail, FileConfig, TailArgs};
use crate::error::CliError;
use crate::render::TerminalTail;

/// Keyboard commands read from stdin, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Toggle,
    Quit,
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim() {
        "" | "p" | "pause" => Some(Key::Toggle),
        "q" | "quit" => Some(Key::Quit),
        _ => None,
    }
}

/// Stdin is read on its own thread; a blocking read would pin the runtime.
fn spawn_input() -> mpsc::UnboundedReceiver<Key> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            if stdin.read_line(&mut line).unwrap_or(0) == 0 {
                break;
            }
            match parse_key(&line) {
                Some(key) => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                None => tracing::warn!(input = line.trim(), "unknown command (enter: pause/resume, q: quit)"),
            }
        }
    });
    rx
}

pub async fn run(config: &str, base_url: Option<&str>, args: TailArgs) -> Result<(), CliError> {
    let cfg = FileConfig::load_or_default(config)?;
    let eff = EffectiveTail::new(base_url, &args, cfg)?;

    let factory = build_factory(&eff.base_url, &eff.transport)?;
    let session = TailSession::new(
        eff.cursor.clone(),
        factory,
        Box::new(TerminalTail::stdout()),
        &eff.session,
    );

    tracing::info!(
        base_url = %eff.base_url,
        transport = %eff.transport.kind,
        topic = eff.cursor.topic.as_deref().unwrap_or(""),
        "starting tail"
    );

    let (handle, commands) = TailHandle::channel(16);
    let mut task = tokio::spawn(session.run(commands));

    let mut input = if eff.interactive {
        Some(spawn_input())
    } else {
        None
    };
    let mut stopping = false;

    let summary = loop {
        tokio::select! {
            joined = &mut task => {
                break joined.map_err(|e| CliError::Tail(e.to_string()))?;
            }
            signal = tokio::signal::ctrl_c(), if !stopping => {
                signal?;
                tracing::info!("shutting down...");
                stopping = true;
                let _ = handle.shutdown().await;
            }
            key = recv_key(&mut input) => match key {
                Some(Key::Toggle) => {
                    let _ = handle.toggle().await;
                }
                Some(Key::Quit) => {
                    stopping = true;
                    let _ = handle.shutdown().await;
                }
                None => input = None,
            },
        }
    };

    tracing::info!(
        messages = summary.messages,
        cursor = %summary.cursor.as_ref().map(|c| c.to_string()).unwrap_or_default(),
        "tail stopped"
    );

    if summary.state == TailState::Errored {
        return Err(CliError::Tail(summary.status.to_string()));
    }
    Ok(())
}

/// Pending forever once stdin is closed or ignored.
async fn recv_key(input: &mut Option<mpsc::UnboundedReceiver<Key>>) -> Option<Key> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
