use clap::Parser;

/// txrecon: reconcile transaction listings between a REST explorer and a
/// GraphQL indexer, and report what either one omits.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1", env = "TXRECON_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3000", env = "TXRECON_PORT")]
    pub port: u16,

    /// REST explorer transaction listing endpoint.
    #[arg(
        long,
        default_value = "https://api.dragonglass.me/hedera/api/transactions",
        env = "TXRECON_DRAGONGLASS_URL"
    )]
    pub dragonglass_url: String,

    /// GraphQL indexer endpoint.
    #[arg(
        long,
        default_value = "https://mainnet.hedera.api.hgraph.io/v1/graphql",
        env = "TXRECON_HGRAPH_URL"
    )]
    pub hgraph_url: String,

    /// Timeout for each outbound provider call, in seconds.
    #[arg(long, default_value = "5", env = "TXRECON_UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: u64,

    /// Maximum rows requested from the indexer; 0 leaves it unbounded.
    #[arg(long, default_value = "100", env = "TXRECON_HGRAPH_LIMIT")]
    pub hgraph_limit: u32,

    /// Payer account the dashboard reconciles.
    #[arg(long, default_value = "26027", env = "TXRECON_DASHBOARD_PAYER_ID")]
    pub dashboard_payer_id: u64,

    /// Memo substring the dashboard reconciles.
    #[arg(long, default_value = "kpay.live", env = "TXRECON_DASHBOARD_QUERY")]
    pub dashboard_query: String,

    /// Transfer account the dashboard reconciles.
    #[arg(long, default_value = "657983", env = "TXRECON_DASHBOARD_ACCOUNT_FROM")]
    pub dashboard_account_from: u64,

    /// Allowed CORS origins (repeatable, or comma-separated in the
    /// environment). Any origin is allowed when none are given.
    #[arg(long = "cors-origin", env = "TXRECON_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Include internal error details in 500 responses.
    #[arg(long, env = "TXRECON_EXPOSE_ERROR_DETAILS")]
    pub expose_error_details: bool,
}
