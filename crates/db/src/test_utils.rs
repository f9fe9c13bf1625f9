//! Test utilities for database operations.
//!
//! [`TestDatabase::sqlite`] gives every test its own in-memory store with the
//! schema derived from the entities. The `PostgreSQL` helpers target a real
//! server for `#[ignore]`d runs.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Index;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseBackend,
    DatabaseConnection, DbErr, EntityTrait, Schema, Set, Statement,
};
use tracing::info;

use crate::entities::user::UserRole;
use crate::entities::{
    CreatorMember, GuestConversionPolicy, GuestConversionState, Invitation, User, creator_member,
    user,
};

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "aiponge_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "aiponge_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "aiponge_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A test database context.
pub struct TestDatabase {
    /// Shared database connection, handed to repositories with `Arc::clone`.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Fresh in-memory `SQLite` store with all tables created.
    ///
    /// The pool holds a single connection: every connection to `:memory:`
    /// opens its own empty database.
    pub async fn sqlite() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        create_schema(&conn).await?;

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Connect to the `PostgreSQL` test database and create missing tables.
    pub async fn postgres() -> Result<Self, DbErr> {
        let config = TestDbConfig::default();
        let conn = Database::connect(&config.database_url()).await?;

        info!(database = %config.database, "Connected to test database");

        create_schema(&conn).await?;
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Delete every row from the tables this crate maps.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        GuestConversionState::delete_many().exec(self.connection()).await?;
        GuestConversionPolicy::delete_many().exec(self.connection()).await?;
        CreatorMember::delete_many().exec(self.connection()).await?;
        Invitation::delete_many().exec(self.connection()).await?;
        User::delete_many().exec(self.connection()).await?;

        info!("Cleaned up test database");
        Ok(())
    }
}

/// Create the mapped tables (if missing) from the entity definitions.
pub async fn create_schema(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Invitation),
        schema.create_table_from_entity(CreatorMember),
        schema.create_table_from_entity(GuestConversionState),
        schema.create_table_from_entity(GuestConversionPolicy),
    ];

    for mut table in tables {
        table.if_not_exists();
        conn.execute(backend.build(&table)).await?;
    }

    // One row per (creator, member) pair; bulk inserts rely on it for ON CONFLICT.
    let pair_index = Index::create()
        .name("idx_creator_member_pair")
        .table(CreatorMember)
        .col(creator_member::Column::CreatorId)
        .col(creator_member::Column::MemberId)
        .unique()
        .if_not_exists()
        .to_owned();
    conn.execute(backend.build(&pair_index)).await?;

    Ok(())
}

/// Insert a user row. Most tables reference `user`, so tests seed these first.
pub async fn seed_user(
    conn: &DatabaseConnection,
    id: &str,
    role: UserRole,
) -> Result<user::Model, DbErr> {
    user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(format!("user_{id}")),
        role: Set(role),
        is_guest: Set(false),
        created_at: Set(Utc::now().fixed_offset()),
        deleted_at: Set(None),
    }
    .insert(conn)
    .await
}

/// Run a raw statement (handy for assertions that bypass the entities).
pub async fn execute_raw(conn: &DatabaseConnection, sql: &str) -> Result<u64, DbErr> {
    let backend: DatabaseBackend = conn.get_database_backend();
    let result = conn
        .execute(Statement::from_string(backend, sql.to_string()))
        .await?;
    Ok(result.rows_affected())
}
