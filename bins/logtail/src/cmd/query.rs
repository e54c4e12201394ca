use std::sync::Arc;

use tail_engine::QuerySession;
use tail_transport::HttpQueryTransport;
use tokio_util::sync::CancellationToken;

use crate::config::{EffectiveQuery, FileConfig, QueryArgs};
use crate::error::CliError;
use crate::render::TerminalQuery;

pub async fn run(config: &str, base_url: Option<&str>, args: QueryArgs) -> Result<(), CliError> {
    let cfg = FileConfig::load_or_default(config)?;
    // Connection knobs are shared with the tail transports.
    let client = cfg.tail.transport.http_client()?;
    let eff = EffectiveQuery::new(base_url, &args, cfg)?;

    let transport = HttpQueryTransport::new(client, &eff.base_url, &eff.path, &eff.topic, eff.timeout)?;
    tracing::info!(
        endpoint = %tail_api::QueryTransport::endpoint(&transport),
        body = %eff.request.to_body().unwrap_or_default(),
        "starting query"
    );

    let session = QuerySession::new(
        eff.request,
        Arc::new(transport),
        Box::new(TerminalQuery::stdout(eff.session.max_results)),
        eff.session,
    )?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutting down...");
                    cancel.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "cannot listen for ctrl-c"),
            }
        })
    };

    let summary = session.run(cancel).await;
    watcher.abort();

    tracing::info!(
        rounds = summary.rounds,
        requests = summary.requests,
        rows = summary.rows,
        cancelled = summary.cancelled,
        "query finished"
    );
    Ok(())
}
