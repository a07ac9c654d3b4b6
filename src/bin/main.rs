use anyhow::Result;
use clap::{Parser, Subcommand};
use identity_sync::{
    ClientParams, Identity, SyncConfig, SyncContext, UserId, create_connection, create_user_sync,
    ensure_schema, load_config,
};
use identity_sync::store::UserService;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "identity-sync")]
#[command(about = "Reconcile authenticated identities with the user store")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, env = "IDENTITY_SYNC_CONFIG")]
    config: Option<PathBuf>,
    /// Database URL, overrides the config file
    #[arg(long, global = true)]
    db_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    Init,
    /// Run the sync hooks on an identity read from a JSON file ("-" for stdin)
    Sync {
        identity: PathBuf,
        /// Refresh the identity from the stored user afterwards
        #[arg(long, default_value_t = false)]
        fetch: bool,
        /// Re-enable the user if it is disabled
        #[arg(long, default_value_t = false)]
        enable: bool,
        /// Create the user when no match exists
        #[arg(long, default_value_t = false)]
        allow_sign_up: bool,
        /// Abort if the hooks take longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show a stored user
    ShowUser {
        /// Numeric user id
        id: Option<UserId>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        login: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("identity_sync=info".parse()?)
                .add_directive("surrealdb=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.db_url {
        config.database.url = url;
    }

    match cli.command {
        Commands::Init => {
            info!("Initializing database at {}", config.database.url);
            let db = create_connection(config.database.clone()).await?;
            ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::Sync {
            identity,
            fetch,
            enable,
            allow_sign_up,
            timeout_ms,
        } => {
            let mut identity = read_identity(&identity)?;
            apply_defaults(&mut identity, &config, fetch, enable, allow_sign_up);

            let (user_sync, _) = create_user_sync(&config).await?;

            let token = CancellationToken::new();
            let mut ctx = SyncContext::background().with_cancellation(token.clone());
            if let Some(ms) = timeout_ms {
                ctx = ctx.with_timeout(Duration::from_millis(ms));
            }

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling sync");
                    token.cancel();
                }
            });

            user_sync.sync_user_hook(&ctx, &mut identity, None).await?;
            user_sync.fetch_synced_user_hook(&ctx, &mut identity, None).await?;
            user_sync.enable_user_hook(&ctx, &mut identity, None).await?;

            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
        Commands::ShowUser { id, email, login } => {
            let (_, store) = create_user_sync(&config).await?;

            let user = match id {
                Some(id) => store.get_by_id(id).await?,
                None => {
                    store
                        .find_by_email_or_login(email.as_deref(), login.as_deref())
                        .await?
                }
            };

            match user {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                None => anyhow::bail!("User not found"),
            }
        }
    }

    Ok(())
}

fn read_identity(path: &Path) -> Result<Identity> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}

/// Layer the config defaults and command-line flags over the identity's own
/// client params. Flags only ever switch behaviour on.
fn apply_defaults(
    identity: &mut Identity,
    config: &SyncConfig,
    fetch: bool,
    enable: bool,
    allow_sign_up: bool,
) {
    let defaults: &ClientParams = &config.defaults;
    let params = &mut identity.client_params;

    params.sync_user = true;
    params.allow_sign_up |= defaults.allow_sign_up || allow_sign_up;
    params.enable_user |= defaults.enable_user || enable;
    params.fetch_synced_user |= defaults.fetch_synced_user || fetch;

    let lookup = &mut params.lookup_params;
    if lookup.email.is_none() {
        lookup.email = identity.email.clone().or_else(|| defaults.lookup_params.email.clone());
    }
    if lookup.login.is_none() {
        lookup.login = identity.login.clone().or_else(|| defaults.lookup_params.login.clone());
    }
}
