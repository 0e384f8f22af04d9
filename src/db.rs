use crate::auth::password::hash_password;
use crate::config::{BootstrapAdmin, Config};
use crate::model::{role::Role, user::UserStatus};
use anyhow::{Context, Result, anyhow};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

pub async fn init_db(config: &Config) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

pub async fn run_migrations(pool: &MySqlPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations applied");
    Ok(())
}

/// Creates the configured admin account unless the email is already registered.
/// Returns true when a row was inserted.
pub async fn seed_admin(pool: &MySqlPool, admin: &BootstrapAdmin) -> Result<bool> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&admin.email)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    let hashed = hash_password(&admin.password).map_err(|e| anyhow!("hash admin password: {e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (name, email, password, role, status, enabled)
        VALUES (?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(&admin.name)
    .bind(&admin.email)
    .bind(hashed)
    .bind(Role::Admin.as_ref())
    .bind(UserStatus::Approved.as_ref())
    .execute(pool)
    .await
    .context("Failed to seed admin account")?;

    info!(email = %admin.email, "Admin account created");
    Ok(true)
}
