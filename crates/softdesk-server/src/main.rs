//! SoftDesk Server: schema management, development fixtures and
//! principal token issuance.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use softdesk_authz::{AuthzConfig, issue_principal_token};
use softdesk_core::Principal;
use softdesk_core::repository::{TenantRepository, UserRepository};
use softdesk_db::repository::{SurrealTenantRepository, SurrealUserRepository};
use softdesk_db::{DbConfig, DbManager};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod seed;

#[derive(Parser)]
#[command(name = "softdesk-server")]
#[command(version)]
#[command(about = "SoftDesk issue tracker server tooling", long_about = None)]
struct Cli {
    /// SurrealDB WebSocket address
    #[arg(long, env = "SOFTDESK_DB_URL", default_value = "127.0.0.1:8000")]
    db_url: String,

    /// SurrealDB namespace
    #[arg(long, env = "SOFTDESK_DB_NS", default_value = "softdesk")]
    db_namespace: String,

    /// SurrealDB database
    #[arg(long, env = "SOFTDESK_DB_NAME", default_value = "support")]
    db_name: String,

    /// SurrealDB root username
    #[arg(long, env = "SOFTDESK_DB_USER", default_value = "root")]
    db_user: String,

    /// SurrealDB root password
    #[arg(long, env = "SOFTDESK_DB_PASS", default_value = "root", hide_env_values = true)]
    db_pass: String,

    /// Secret mixed into every password hash
    #[arg(long, env = "SOFTDESK_PASSWORD_PEPPER", hide_env_values = true)]
    pepper: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Reset the Meridien development tenant and load its fixtures
    Seed,
    /// Reset the Meridien development tenant to its superuser only
    Erase,
    /// Issue a principal token for a user
    Token {
        /// Email domain of the user's tenant
        #[arg(long)]
        domain: String,
        #[arg(long)]
        username: String,
        /// PEM-encoded Ed25519 private key
        #[arg(long, env = "SOFTDESK_JWT_PRIVATE_KEY_FILE")]
        private_key: PathBuf,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 900)]
        lifetime_secs: u64,
    },
}

impl Cli {
    fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_name.clone(),
            username: self.db_user.clone(),
            password: self.db_pass.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("softdesk=info".parse()?))
        .json()
        .init();

    let cli = Cli::parse();
    let manager = DbManager::connect(&cli.db_config()).await?;
    let applied = manager.migrate().await.context("applying migrations")?;
    info!(applied, "Schema up to date");

    match cli.command {
        Commands::Migrate => {}
        Commands::Seed => {
            seed::seed(manager.client(), cli.pepper).await?;
        }
        Commands::Erase => {
            seed::erase(manager.client(), cli.pepper).await?;
            info!(domain = seed::TENANT_DOMAIN, "Development tenant erased");
        }
        Commands::Token {
            domain,
            username,
            private_key,
            lifetime_secs,
        } => {
            let config = AuthzConfig {
                jwt_private_key_pem: std::fs::read_to_string(&private_key)
                    .with_context(|| format!("reading {}", private_key.display()))?,
                token_lifetime_secs: lifetime_secs,
                ..AuthzConfig::default()
            };

            let db = manager.client().clone();
            let tenant = SurrealTenantRepository::new(db.clone())
                .get_by_domain(&domain)
                .await?;
            let user = SurrealUserRepository::new(db)
                .get_by_username(tenant.id, &username)
                .await?;

            let token = issue_principal_token(&Principal::from(&user), &config)?;
            info!(user_id = %user.id, tenant_id = %tenant.id, "Principal token issued");
            println!("{token}");
        }
    }

    Ok(())
}
