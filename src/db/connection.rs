use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

/// Connection settings. Fields missing from a config file fall back to the
/// `SURREALDB_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE")
                .unwrap_or_else(|_| "identity".to_string()),
            database: env::var("SURREALDB_DATABASE")
                .unwrap_or_else(|_| "users".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

/// Define the tables and unique indexes the user adapters rely on.
///
/// Safe to run on every startup.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Users, keyed by their numeric uid (user:<uid>)
        "DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS uid ON TABLE user TYPE int;
         DEFINE FIELD IF NOT EXISTS login ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS name ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS email ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS email_verified ON TABLE user TYPE bool DEFAULT false;
         DEFINE FIELD IF NOT EXISTS is_disabled ON TABLE user TYPE bool DEFAULT false;
         DEFINE FIELD IF NOT EXISTS is_admin ON TABLE user TYPE bool DEFAULT false;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user TYPE datetime DEFAULT time::now();",

        // (auth module, subject) -> user associations
        "DEFINE TABLE IF NOT EXISTS user_auth SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS auth_module ON TABLE user_auth TYPE string;
         DEFINE FIELD IF NOT EXISTS auth_id ON TABLE user_auth TYPE string;
         DEFINE FIELD IF NOT EXISTS user_id ON TABLE user_auth TYPE int;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user_auth TYPE datetime DEFAULT time::now();",

        // Id counters
        "DEFINE TABLE IF NOT EXISTS sequence SCHEMALESS;",

        // Uniqueness is what turns concurrent sign-ups into conflicts
        "DEFINE INDEX IF NOT EXISTS user_uid ON TABLE user COLUMNS uid UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_login ON TABLE user COLUMNS login UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_email ON TABLE user COLUMNS email UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_auth_subject ON TABLE user_auth COLUMNS auth_module, auth_id UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_auth_user ON TABLE user_auth COLUMNS user_id;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
