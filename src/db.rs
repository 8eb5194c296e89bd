//! Store queries outside the snapshot write transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{Shop, ShopInfo, Snapshot};

// ---

/// Insert or refresh a shop by its `commonCode`.
pub async fn upsert_shop(
    pool: &PgPool,
    common_code: &str,
    info: &ShopInfo,
) -> Result<Shop, sqlx::Error> {
    // ---
    sqlx::query_as::<_, Shop>(
        r#"
        INSERT INTO shops (common_code, name, address)
        VALUES ($1, $2, $3)
        ON CONFLICT (common_code) DO UPDATE SET
            name    = EXCLUDED.name,
            address = EXCLUDED.address
        RETURNING id, common_code, name, address
        "#,
    )
    .bind(common_code)
    .bind(&info.store_name)
    .bind(&info.store_address)
    .fetch_one(pool)
    .await
}

pub async fn find_shop(pool: &PgPool, common_code: &str) -> Result<Option<Shop>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, Shop>(
        "SELECT id, common_code, name, address FROM shops WHERE common_code = $1",
    )
    .bind(common_code)
    .fetch_optional(pool)
    .await
}

/// Snapshots of one shop captured in `[start, end)`, oldest first.
pub async fn snapshots_in_window(
    pool: &PgPool,
    shop_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Snapshot>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, Snapshot>(
        r#"
        SELECT id, shop_id, captured_at, shop_status,
               total_devices, used_devices, usage_rate
        FROM snapshots
        WHERE shop_id = $1 AND captured_at >= $2 AND captured_at < $3
        ORDER BY captured_at
        "#,
    )
    .bind(shop_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Fixtures for tests that need a real Postgres (`DATABASE_URL`).
#[cfg(test)]
pub(crate) mod test_store {
    // ---
    use sqlx::PgPool;
    use uuid::Uuid;

    use crate::models::{Shop, ShopInfo, STATUS_OPERATING};

    /// Connect, apply the schema and register a shop no other test uses.
    pub async fn fresh_shop() -> (PgPool, Shop) {
        // ---
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();

        // Concurrent CREATE TABLE IF NOT EXISTS can still collide; serialize it.
        let mut lock = pool.acquire().await.unwrap();
        sqlx::query("SELECT pg_advisory_lock(7301)")
            .execute(&mut *lock)
            .await
            .unwrap();
        crate::schema::create_schema(&pool).await.unwrap();
        sqlx::query("SELECT pg_advisory_unlock(7301)")
            .execute(&mut *lock)
            .await
            .unwrap();
        drop(lock);

        let info = ShopInfo {
            store_name: "Test Shop".to_string(),
            store_address: "1 Test Road".to_string(),
            shop_status: STATUS_OPERATING.to_string(),
        };
        let code = format!("test-{}", Uuid::new_v4());
        let shop = super::upsert_shop(&pool, &code, &info).await.unwrap();
        (pool, shop)
    }

    pub async fn count(pool: &PgPool, sql: &str, shop_id: i64) -> i64 {
        sqlx::query_scalar(sql)
            .bind(shop_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }
}
