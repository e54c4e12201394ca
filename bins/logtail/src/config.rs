use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use tail_api::{index_field, CursorRequest, QueryClause, QueryOp, QueryRequest, TransportKind};
use tail_engine::{QuerySettings, TailSettings};
use tail_transport::{default_query_path, TransportSettings};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "logtail", about = "Tail and query an append-only event log")]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "logtail.toml", env = "LOGTAIL_CONFIG")]
    pub config: String,

    /// Service base URL, e.g. https://logs.example:8443
    #[arg(long, global = true, env = "LOGTAIL_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow the end of a topic
    Tail(TailArgs),
    /// Run a structured query against an indexed topic
    Query(QueryArgs),
}

#[derive(Args, Clone, Debug)]
pub struct TailArgs {
    #[arg(long, short)]
    pub topic: Option<String>,

    /// Start offset; -1 lets the server choose
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<i64>,

    /// Page size and number of lines kept on screen
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// stream (server-sent events) or poll
    #[arg(long)]
    pub transport: Option<TransportKind>,

    #[arg(long)]
    pub render_interval_ms: Option<u64>,

    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,

    /// Request double-encoded payloads from the poll endpoint
    #[arg(long)]
    pub double_encode: bool,

    /// Ignore stdin (no pause/quit commands)
    #[arg(long)]
    pub no_input: bool,
}

#[derive(Args, Clone, Debug)]
pub struct QueryArgs {
    #[arg(long, short)]
    pub topic: Option<String>,

    /// Full index field, e.g. event_log.ID:index
    #[arg(long, conflicts_with = "index")]
    pub field: Option<String>,

    /// Index name; the field becomes <topic>.<index>:index
    #[arg(long)]
    pub index: Option<String>,

    #[arg(long)]
    pub op: Option<QueryOp>,

    #[arg(long, short, allow_hyphen_values = true)]
    pub key: Option<String>,

    /// Compound condition FIELD,OP[,KEY]; repeat for more
    #[arg(long = "clause", value_name = "FIELD,OP[,KEY]")]
    pub clauses: Vec<QueryClause>,

    #[arg(long)]
    pub max_results: Option<usize>,

    #[arg(long)]
    pub repoll_interval_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub base_url: Option<String>,
    #[serde(default)]
    pub tail: TailSection,
    #[serde(default)]
    pub query: QuerySection,
}

#[derive(Debug, Default, Deserialize)]
pub struct TailSection {
    #[serde(flatten)]
    pub cursor: CursorRequest,
    #[serde(flatten)]
    pub session: TailSettings,
    #[serde(default)]
    pub transport: TransportSettings,
}

#[derive(Debug, Deserialize)]
pub struct QuerySection {
    pub topic: Option<String>,
    pub field: Option<String>,
    pub index: Option<String>,
    pub op: Option<QueryOp>,
    pub key: Option<String>,
    #[serde(default)]
    pub clauses: Vec<QueryClause>,
    #[serde(default = "default_query_path")]
    pub path: String,
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(flatten)]
    pub session: QuerySettings,
}

fn default_query_timeout_ms() -> u64 {
    15000
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            topic: None,
            field: None,
            index: None,
            op: None,
            key: None,
            clauses: Vec::new(),
            path: default_query_path(),
            timeout_ms: default_query_timeout_ms(),
            session: QuerySettings::default(),
        }
    }
}

impl FileConfig {
    pub fn load(path: &str) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content).map_err(|e| CliError::Config {
            context: "parse",
            detail: format!("'{path}': {e}"),
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// A missing file is fine; a broken one is not.
    pub fn load_or_default(path: &str) -> Result<Self, CliError> {
        if !std::path::Path::new(path).exists() {
            tracing::debug!(path, "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

fn base_url(cli: Option<&str>, cfg: Option<String>) -> Result<String, CliError> {
    cli.map(str::to_string)
        .or(cfg)
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| CliError::Config {
            context: "base_url",
            detail: "no service URL (use --base-url, LOGTAIL_BASE_URL or base_url in the config file)"
                .into(),
        })
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Tail configuration after merging: config file < env/CLI.
#[derive(Debug)]
pub struct EffectiveTail {
    pub base_url: String,
    pub cursor: CursorRequest,
    pub session: TailSettings,
    pub transport: TransportSettings,
    pub interactive: bool,
}

impl EffectiveTail {
    pub fn new(cli_base: Option<&str>, args: &TailArgs, cfg: FileConfig) -> Result<Self, CliError> {
        let base_url = base_url(cli_base, cfg.base_url)?;
        let TailSection {
            cursor: file_cursor,
            mut session,
            mut transport,
        } = cfg.tail;

        let cursor = CursorRequest {
            topic: args.topic.clone(),
            offset: args.offset,
            count: args.count,
        }
        .or(&file_cursor);

        if let Some(ms) = args.render_interval_ms {
            session.render_interval_ms = ms;
        }
        if let Some(ms) = args.reconnect_delay_ms {
            session.reconnect_delay_ms = ms;
            session.max_reconnect_delay_ms = session.max_reconnect_delay_ms.max(ms);
        }
        if let Some(kind) = args.transport {
            transport.kind = kind;
        }
        transport.double_encode |= args.double_encode;

        Ok(Self {
            base_url,
            cursor,
            session,
            transport,
            interactive: !args.no_input,
        })
    }
}

/// Query configuration after merging: config file < env/CLI.
#[derive(Debug)]
pub struct EffectiveQuery {
    pub base_url: String,
    pub topic: String,
    pub path: String,
    pub request: QueryRequest,
    pub session: QuerySettings,
    pub timeout: Option<Duration>,
}

pub const DEFAULT_QUERY_TOPIC: &str = "event_log";
pub const DEFAULT_QUERY_INDEX: &str = "ID";

impl EffectiveQuery {
    pub fn new(cli_base: Option<&str>, args: &QueryArgs, cfg: FileConfig) -> Result<Self, CliError> {
        let base_url = base_url(cli_base, cfg.base_url)?;
        let q = cfg.query;

        let topic = args
            .topic
            .clone()
            .or(q.topic)
            .unwrap_or_else(|| DEFAULT_QUERY_TOPIC.to_string());

        let clauses = if args.clauses.is_empty() {
            q.clauses
        } else {
            args.clauses.clone()
        };

        let request = if !clauses.is_empty() {
            QueryRequest::compound(clauses)?
        } else {
            // An explicit --index on the CLI beats a field from the file.
            let field = match (&args.field, &args.index) {
                (Some(field), _) => field.clone(),
                (None, Some(index)) => index_field(&topic, index),
                (None, None) => q.field.unwrap_or_else(|| {
                    index_field(&topic, q.index.as_deref().unwrap_or(DEFAULT_QUERY_INDEX))
                }),
            };
            let key = args.key.clone().or(q.key);
            match args.op.or(q.op) {
                Some(op) => QueryRequest::Single(QueryClause::new(field, op, key.unwrap_or_default())),
                None => QueryRequest::lookup(field, key.as_deref()),
            }
        };

        let mut session = q.session;
        if let Some(n) = args.max_results {
            session.max_results = n;
        }
        if let Some(ms) = args.repoll_interval_ms {
            session.repoll_interval_ms = ms;
        }

        Ok(Self {
            base_url,
            topic,
            path: q.path,
            request,
            session,
            timeout: (q.timeout_ms > 0).then(|| Duration::from_millis(q.timeout_ms)),
        })
    }
}
