pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;

#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    // A single connection keeps every query on the same in-memory database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    pool
}
