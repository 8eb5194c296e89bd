//! Database schema management for `wywk-occupancy`.
//!
//! Ensures required tables and indexes exist before polling starts.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `shops` and `rooms` dimensions and the append-only
/// `snapshots` / `room_snapshots` fact tables. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shops (
            id          BIGSERIAL PRIMARY KEY,
            common_code TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            address     TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Physical attributes stay NULL until a room element is resolved
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id            BIGSERIAL PRIMARY KEY,
            shop_id       BIGINT  NOT NULL REFERENCES shops (id),
            code          TEXT    NOT NULL,
            name          TEXT    NOT NULL,
            total_devices INTEGER NOT NULL,
            no_smoking    INTEGER,
            width         DOUBLE PRECISION,
            height        DOUBLE PRECISION,
            UNIQUE (shop_id, code)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            id            BIGSERIAL PRIMARY KEY,
            shop_id       BIGINT      NOT NULL REFERENCES shops (id),
            captured_at   TIMESTAMPTZ NOT NULL,
            shop_status   TEXT        NOT NULL,
            total_devices INTEGER     NOT NULL,
            used_devices  INTEGER     NOT NULL,
            usage_rate    DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS room_snapshots (
            id            BIGSERIAL PRIMARY KEY,
            snapshot_id   BIGINT  NOT NULL REFERENCES snapshots (id),
            room_id       BIGINT  NOT NULL REFERENCES rooms (id),
            total_devices INTEGER NOT NULL,
            used_devices  INTEGER NOT NULL,
            usage_rate    DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Rollups scan by shop and time range
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_snapshots_shop_captured
            ON snapshots (shop_id, captured_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_room_snapshots_snapshot_id
            ON room_snapshots (snapshot_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
