//! PostgreSQL for integration tests
//!
//! Each [`TestDatabase`] owns a throwaway container with the billing schema
//! applied. Dropping it stops the container.

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

static MIGRATOR: Migrator = sqlx::migrate!("../infra_db/migrations");

const IMAGE: (&str, &str) = ("postgres", "16-alpine");
const READY_LINE: &str = "database system is ready to accept connections";
const USER: &str = "billing";
const PASSWORD: &str = "billing";
const DATABASE: &str = "billing_test";

fn connection_url(host: &str, port: u16) -> String {
    format!("postgres://{USER}:{PASSWORD}@{host}:{port}/{DATABASE}")
}

/// A migrated database inside a running container
pub struct TestDatabase {
    pool: PgPool,
    url: String,
    _container: ContainerAsync<GenericImage>,
}

impl TestDatabase {
    /// Starts a container, waits for readiness and runs the migrations
    pub async fn new() -> Result<Self, BoxError> {
        let container = GenericImage::new(IMAGE.0, IMAGE.1)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(READY_LINE))
            .with_env_var("POSTGRES_USER", USER)
            .with_env_var("POSTGRES_PASSWORD", PASSWORD)
            .with_env_var("POSTGRES_DB", DATABASE)
            .start()
            .await?;

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(5432).await?;
        let url = connection_url(&host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await?;
        MIGRATOR.run(&pool).await?;

        Ok(Self {
            pool,
            url,
            _container: container,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// URL for opening a second, independent pool against the same container
    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Empties every billing table, keeping the schema
    pub async fn clear_data(&self) -> Result<(), BoxError> {
        sqlx::query("TRUNCATE TABLE line_items, bills, workflow_signals RESTART IDENTITY CASCADE")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// One container per test
pub async fn create_isolated_test_database() -> Result<TestDatabase, BoxError> {
    TestDatabase::new().await
}
