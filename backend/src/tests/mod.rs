pub mod helpers;
pub mod integration;
pub mod unit;

use sqlx::PgPool;

/// Connection to a real Postgres for the `#[ignore]`d storage suite.
/// Point `TEST_DATABASE_URL` at a disposable database before running it.
pub struct TestContext {
    pub db_pool: PgPool,
}

impl TestContext {
    pub async fn new() -> Self {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must be set for Postgres tests");

        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Self { db_pool: pool }
    }

    pub async fn cleanup(&self) {
        for table in ["workflow_executions", "workflows", "notifications", "customers"] {
            sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", table))
                .execute(&self.db_pool)
                .await
                .ok();
        }
    }
}
