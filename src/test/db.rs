//! Database test utilities and shared infrastructure

use once_cell::sync::Lazy;
use sqlx::{Connection, PgConnection, PgPool};
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use tokio::sync::{OnceCell, mpsc};

use crate::database;

const PG_USER: &str = "dps_test";
const PG_PASSWORD: &str = "dps_test_password";

/// Validate a generated database name before splicing it into DDL.
fn validate_database_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > 63 {
        return Err("database name must be 1-63 characters long".to_string());
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err("database name must start with a letter or underscore".to_string());
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("database name may only contain letters, digits, and underscores".to_string());
    }

    Ok(())
}

/// Shared PostgreSQL container initialization
async fn init_postgres_container() -> ContainerAsync<PostgresImage> {
    PostgresImage::default()
        .with_user(PG_USER)
        .with_password(PG_PASSWORD)
        .with_db_name("dps_test")
        .with_env_var("POSTGRES_INITDB_ARGS", "--auth-host=trust")
        .start()
        .await
        .expect("Failed to start PostgreSQL container")
}

/// Shared PostgreSQL container that starts once and is reused across all tests
static POSTGRES_CONTAINER: Lazy<OnceCell<ContainerAsync<PostgresImage>>> = Lazy::new(OnceCell::new);

/// Cleanup channel for database cleanup requests
static CLEANUP_SENDER: Lazy<OnceCell<mpsc::UnboundedSender<String>>> = Lazy::new(OnceCell::new);

async fn init_cleanup_task() -> mpsc::UnboundedSender<String> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(db_name) = receiver.recv().await {
            if let Err(err) = cleanup_database(&db_name).await {
                eprintln!("Failed to cleanup database '{db_name}': {err}");
            }
        }
    });

    sender
}

fn container_host() -> String {
    std::env::var("TESTCONTAINERS_HOST_OVERRIDE").unwrap_or_else(|_| "localhost".to_string())
}

async fn maintenance_url() -> Option<String> {
    let container = POSTGRES_CONTAINER.get()?;
    let port = container.get_host_port_ipv4(5432).await.ok()?;
    let host = container_host();

    Some(format!(
        "postgresql://{PG_USER}:{PG_PASSWORD}@{host}:{port}/postgres"
    ))
}

/// Drop a test database by name.
async fn cleanup_database(db_name: &str) -> Result<(), sqlx::Error> {
    if let Some(base_url) = maintenance_url().await
        && let Ok(mut conn) = PgConnection::connect(&base_url).await
    {
        if validate_database_name(db_name).is_ok() {
            let drop_query = format!("DROP DATABASE IF EXISTS \"{db_name}\"");
            let _ = sqlx::query(&drop_query).execute(&mut conn).await;
        }
        let _ = conn.close().await;
    }

    Ok(())
}

/// Test database configuration
///
/// Each `TestDb` instance creates a uniquely named database within a shared
/// PostgreSQL container, with migrations applied. Isolation is
/// database-level: services commit their own transactions normally, and the
/// clean state comes for free from the per-test database. The database is
/// dropped in the background when the instance goes out of scope.
#[derive(Debug, Clone)]
pub(crate) struct TestDb {
    pub(crate) pool: PgPool,
    pub(crate) name: String,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        if let Some(sender) = CLEANUP_SENDER.get() {
            let _ = sender.send(self.name.clone());
        }
    }
}

impl TestDb {
    /// Create an isolated test database with a unique generated name.
    pub(crate) async fn new() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_nanos();

        let thread_id = std::thread::current().id();

        let name = format!("dps_store_test_{nanos}_{thread_id:?}").replace([':', ' ', '(', ')'], "");
        let db_name = name.as_str();

        let _cleanup_sender = CLEANUP_SENDER.get_or_init(init_cleanup_task).await;

        if let Err(error) = validate_database_name(db_name) {
            panic!("Invalid database name '{db_name}': {error}");
        }

        let container = POSTGRES_CONTAINER
            .get_or_init(init_postgres_container)
            .await;

        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get container port");

        let host = container_host();

        let base_url = format!("postgresql://{PG_USER}:{PG_PASSWORD}@{host}:{port}/postgres");

        let mut conn = PgConnection::connect(&base_url)
            .await
            .expect("Failed to connect to postgres database");

        let create_db_query = format!("CREATE DATABASE \"{db_name}\"");

        sqlx::query(&create_db_query)
            .execute(&mut conn)
            .await
            .expect("Failed to create test database");

        conn.close()
            .await
            .expect("Failed to close admin connection");

        let database_url =
            format!("postgresql://{PG_USER}:{PG_PASSWORD}@{host}:{port}/{db_name}");

        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to create pool for database");

        database::migrate(&pool)
            .await
            .expect("Failed to run migrations on database");

        Self {
            pool,
            name: db_name.to_string(),
        }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
