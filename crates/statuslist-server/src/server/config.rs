use anyhow::{Context, bail};
use clap::Parser;
use core::num::NonZeroUsize;
use core::time::Duration;
use statuslist_core::statuslist::STATUS_LIST_2021;
use statuslist_core::store::postgres::PgStoreOptions;

/// Largest accepted list size in bytes (2^31 bits).
pub const MAX_LIST_SIZE_IN_BYTES: usize = 1 << 28;

/// Largest status list credential accepted from another issuer.
pub const MAX_CREDENTIAL_SIZE_IN_BYTES: usize = 16 << 20;

/// Runtime configuration for the `statuslist-server` binary.
///
/// Every value can be passed as a CLI flag or through the environment (a
/// `.env` file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "statuslist-server",
    version,
    about = "Issues, revokes and verifies StatusList2021 credential status entries"
)]
pub struct CliArgs {
    /// Address the HTTP server binds to.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// PostgreSQL connection string.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Size of the connection pool.
    ///
    /// Environment variable: `DB_MAX_CONNECTIONS`
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// How long to keep retrying the initial database connection.
    ///
    /// Environment variable: `DB_CONNECT_TIMEOUT_SECS`
    #[arg(long, env = "DB_CONNECT_TIMEOUT_SECS", default_value_t = 60)]
    pub db_connect_timeout_secs: u64,

    /// Size of every newly created status list. Each byte holds eight
    /// credential indices.
    ///
    /// Environment variable: `LIST_SIZE_IN_BYTES`
    #[arg(long, env = "LIST_SIZE_IN_BYTES", default_value_t = 1024)]
    pub list_size_in_bytes: usize,

    /// Deadline for a single request, including store and signer calls.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// How long in-flight requests may drain after a shutdown signal.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Base URL of the signer service.
    ///
    /// Environment variable: `SIGNER_URL`
    #[arg(long, env = "SIGNER_URL", default_value_t = String::from("http://localhost:8082"))]
    pub signer_url: String,

    /// Signing key used when a request carries no `X-KEY` header.
    ///
    /// Environment variable: `DEFAULT_KEY`
    #[arg(long, env = "DEFAULT_KEY", default_value_t = String::from("test"))]
    pub default_key: String,

    /// Issuer DID used when a request carries no `X-DID` header.
    ///
    /// Environment variable: `DEFAULT_DID`
    #[arg(long, env = "DEFAULT_DID", default_value_t = String::from("did:web:localhost:8081:v1:did:document"))]
    pub default_did: String,

    /// Signer namespace used when a request carries no `X-NAMESPACE` header.
    ///
    /// Environment variable: `DEFAULT_NAMESPACE`
    #[arg(long, env = "DEFAULT_NAMESPACE", default_value_t = String::from("transit"))]
    pub default_namespace: String,

    /// Signer group used when a request carries no `X-GROUP` header.
    ///
    /// Environment variable: `DEFAULT_GROUP`
    #[arg(long, env = "DEFAULT_GROUP", default_value_t = String::new())]
    pub default_group: String,

    /// Public base URL of published lists, used when a request carries no
    /// `X-HOST` header.
    ///
    /// Environment variable: `DEFAULT_HOST`
    #[arg(long, env = "DEFAULT_HOST", default_value_t = String::from("http://localhost:8081/v1/tenants/transit"))]
    pub default_host: String,

    /// Credential type served when a request carries no `X-TYPE` header.
    ///
    /// Environment variable: `DEFAULT_LIST_TYPE`
    #[arg(long, env = "DEFAULT_LIST_TYPE", default_value_t = String::from(STATUS_LIST_2021))]
    pub default_list_type: String,

    /// Lifetime of signed status list tokens.
    ///
    /// Environment variable: `TOKEN_TTL_SECS`
    #[arg(long, env = "TOKEN_TTL_SECS", default_value_t = 86_400)]
    pub token_ttl_secs: u64,
}

/// Values substituted for absent per-request signing headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningDefaults {
    pub key: String,
    pub did: String,
    pub namespace: String,
    pub group: String,
    pub host: String,
    pub list_type: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub database_url: String,
    pub store: PgStoreOptions,
    pub list_size_in_bytes: NonZeroUsize,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub signer_url: reqwest::Url,
    pub defaults: SigningDefaults,
    pub token_ttl: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(list_size_in_bytes) = NonZeroUsize::new(args.list_size_in_bytes) else {
            bail!("LIST_SIZE_IN_BYTES must be greater than 0");
        };
        if list_size_in_bytes.get() > MAX_LIST_SIZE_IN_BYTES {
            bail!(
                "LIST_SIZE_IN_BYTES ({}) exceeds the maximum of {}",
                list_size_in_bytes,
                MAX_LIST_SIZE_IN_BYTES
            );
        }
        if args.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be greater than 0");
        }
        if args.request_timeout_ms == 0 {
            bail!("REQUEST_TIMEOUT_MS must be greater than 0");
        }
        if args.database_url.trim().is_empty() {
            bail!("DATABASE_URL must not be empty");
        }

        let signer_url = reqwest::Url::parse(args.signer_url.trim_end_matches('/'))
            .with_context(|| format!("SIGNER_URL ({}) is not a valid URL", args.signer_url))?;

        Ok(Self {
            server_addr: args.server_addr,
            database_url: args.database_url,
            store: PgStoreOptions {
                max_connections: args.db_max_connections,
                connect_timeout: Duration::from_secs(args.db_connect_timeout_secs),
                ..PgStoreOptions::default()
            },
            list_size_in_bytes,
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            signer_url,
            defaults: SigningDefaults {
                key: args.default_key,
                did: args.default_did,
                namespace: args.default_namespace,
                group: args.default_group,
                host: args.default_host.trim_end_matches('/').to_string(),
                list_type: args.default_list_type,
            },
            token_ttl: Duration::from_secs(args.token_ttl_secs),
        })
    }
}
