//! Snapshot writer: turns one poll's aggregates into durable rows.
//!
//! Planning (rates, zero-seat filtering, attribute resolution) is pure and
//! lives in [`SnapshotPlan`]; [`persist`] executes a plan inside a single
//! transaction so a snapshot is never visible without its room snapshots.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::PollResult;
use crate::models::Snapshot;
use crate::parser::{ParsedLayout, PhysicalAttrs};

// ---

/// One room's row set for a single poll.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPlan {
    // ---
    pub code: String,
    pub name: String,
    pub total_devices: i32,
    pub used_devices: i32,
    pub usage_rate: f64,
    /// Only set when the room's physical element was resolved.
    pub physical: Option<PhysicalAttrs>,
}

/// Everything one poll cycle writes for a shop.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPlan {
    // ---
    pub shop_id: i64,
    pub captured_at: DateTime<Utc>,
    pub shop_status: String,
    pub total_devices: i32,
    pub used_devices: i32,
    pub usage_rate: Option<f64>,
    pub rooms: Vec<RoomPlan>,
}

impl SnapshotPlan {
    /// Plan for an operating shop. Rooms without seats are dropped.
    pub fn build(
        shop_id: i64,
        captured_at: DateTime<Utc>,
        shop_status: &str,
        parsed: &ParsedLayout,
    ) -> Self {
        // ---
        let rooms = parsed
            .shop
            .rooms
            .iter()
            .filter_map(|(code, room)| {
                let usage_rate = room.usage_rate()?;
                let name = parsed
                    .room_names
                    .get(code)
                    .cloned()
                    .unwrap_or_else(|| room.room_name.clone());
                let physical = room
                    .physical_room_id
                    .and_then(|id| parsed.physical_attrs.get(&id).copied());

                Some(RoomPlan {
                    code: code.clone(),
                    name,
                    total_devices: room.total_seats,
                    used_devices: room.used_seats,
                    usage_rate,
                    physical,
                })
            })
            .collect();

        Self {
            shop_id,
            captured_at,
            shop_status: shop_status.to_string(),
            total_devices: parsed.shop.total_devices,
            used_devices: parsed.shop.used_devices,
            usage_rate: parsed.shop.usage_rate(),
            rooms,
        }
    }

    /// Plan for a shop that is not operating: status only, zero counts.
    pub fn closed(shop_id: i64, captured_at: DateTime<Utc>, shop_status: &str) -> Self {
        Self {
            shop_id,
            captured_at,
            shop_status: shop_status.to_string(),
            total_devices: 0,
            used_devices: 0,
            usage_rate: None,
            rooms: Vec::new(),
        }
    }

    /// The shop-level row this plan produces once stored under `id`.
    pub fn to_snapshot(&self, id: i64) -> Snapshot {
        Snapshot {
            id,
            shop_id: self.shop_id,
            captured_at: self.captured_at,
            shop_status: self.shop_status.clone(),
            total_devices: self.total_devices,
            used_devices: self.used_devices,
            usage_rate: self.usage_rate,
        }
    }
}

// ---

/// Write a plan atomically and return the stored shop-level row.
///
/// Any error drops the transaction, rolling back every row of this plan.
pub async fn persist(pool: &PgPool, plan: &SnapshotPlan) -> PollResult<Snapshot> {
    // ---
    let mut tx = pool.begin().await?;

    let snapshot_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO snapshots (
            shop_id, captured_at, shop_status,
            total_devices, used_devices, usage_rate
        ) VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(plan.shop_id)
    .bind(plan.captured_at)
    .bind(&plan.shop_status)
    .bind(plan.total_devices)
    .bind(plan.used_devices)
    .bind(plan.usage_rate)
    .fetch_one(&mut *tx)
    .await?;

    for room in &plan.rooms {
        // Room is a slowly-changing dimension: overwrite, keep old attrs when unresolved.
        let room_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO rooms (shop_id, code, name, total_devices, no_smoking, width, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (shop_id, code) DO UPDATE SET
                name          = EXCLUDED.name,
                total_devices = EXCLUDED.total_devices,
                no_smoking    = COALESCE(EXCLUDED.no_smoking, rooms.no_smoking),
                width         = COALESCE(EXCLUDED.width, rooms.width),
                height        = COALESCE(EXCLUDED.height, rooms.height)
            RETURNING id
            "#,
        )
        .bind(plan.shop_id)
        .bind(&room.code)
        .bind(&room.name)
        .bind(room.total_devices)
        .bind(room.physical.map(|p| p.no_smoking))
        .bind(room.physical.map(|p| p.width))
        .bind(room.physical.map(|p| p.height))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO room_snapshots (
                snapshot_id, room_id, total_devices, used_devices, usage_rate
            ) VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snapshot_id)
        .bind(room_id)
        .bind(room.total_devices)
        .bind(room.used_devices)
        .bind(room.usage_rate)
        .execute(&mut *tx)
        .await?;

        debug!(room = %room.code, room_id, "Room snapshot staged");
    }

    tx.commit().await?;

    info!(
        snapshot_id,
        shop_id = plan.shop_id,
        status = %plan.shop_status,
        rooms = plan.rooms.len(),
        "Snapshot written"
    );
    Ok(plan.to_snapshot(snapshot_id))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::db::test_store::{self, count};
    use crate::error::PollError;
    use crate::parser::{self, RoomAggregate};
    use crate::rollup;
    use chrono::{FixedOffset, TimeDelta, TimeZone};
    use serde_json::json;

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 6, 30, 0).unwrap()
    }

    fn sample_layout() -> ParsedLayout {
        // ---
        let body = json!({
            "data": { "areas": [
                {
                    "elements": [
                        { "id": 10, "elementCode": "PRIVATE_ROOM",
                          "noSmokingFlag": 1, "width": 4.0, "height": 2.5 },
                        { "id": 1, "elementCode": "SEAT",
                          "clientInfo": { "roomCode": "R1", "roomName": "Room One", "status": 1 } },
                        { "id": 2, "elementCode": "SEAT",
                          "clientInfo": { "roomCode": "R1", "status": 0 } }
                    ],
                    "relations": [ { "roomId": 10, "seatIds": [1, 2] } ]
                },
                {
                    "elements": [
                        { "id": 3, "elementCode": "SEAT",
                          "clientInfo": { "roomCode": "R2", "roomName": "Room Two", "status": 1 } }
                    ]
                }
            ]}
        })
        .to_string();
        parser::parse(&body).unwrap()
    }

    #[test]
    fn test_build_operating_plan() {
        // ---
        let plan = SnapshotPlan::build(7, captured(), "营业中", &sample_layout());

        assert_eq!(plan.total_devices, 3);
        assert_eq!(plan.used_devices, 2);
        let rate = plan.usage_rate.unwrap();
        assert!((rate - 66.666).abs() < 0.01);

        assert_eq!(plan.rooms.len(), 2);
        let r1 = &plan.rooms[0];
        assert_eq!(r1.code, "R1");
        assert_eq!(r1.name, "Room One");
        assert_eq!(r1.usage_rate, 50.0);
        assert_eq!(
            r1.physical,
            Some(PhysicalAttrs { no_smoking: 1, width: 4.0, height: 2.5 })
        );

        let r2 = &plan.rooms[1];
        assert_eq!(r2.code, "R2");
        assert_eq!(r2.usage_rate, 100.0);
        assert_eq!(r2.physical, None);
    }

    #[test]
    fn test_zero_seat_rooms_are_skipped() {
        // ---
        let mut parsed = sample_layout();
        parsed.shop.rooms.insert(
            "EMPTY".to_string(),
            RoomAggregate {
                room_name: "Empty".to_string(),
                total_seats: 0,
                used_seats: 0,
                physical_room_id: None,
            },
        );

        let plan = SnapshotPlan::build(7, captured(), "营业中", &parsed);
        assert!(plan.rooms.iter().all(|r| r.code != "EMPTY"));
        assert_eq!(plan.rooms.len(), 2);
    }

    #[test]
    fn test_zero_device_shop_has_no_rate() {
        // ---
        let plan = SnapshotPlan::build(7, captured(), "营业中", &ParsedLayout::default());
        assert_eq!(plan.usage_rate, None);
        assert!(plan.rooms.is_empty());
    }

    #[test]
    fn test_closed_plan() {
        // ---
        let plan = SnapshotPlan::closed(7, captured(), "休息中");
        assert_eq!(plan.shop_status, "休息中");
        assert_eq!((plan.total_devices, plan.used_devices), (0, 0));
        assert_eq!(plan.usage_rate, None);
        assert!(plan.rooms.is_empty());

        let row = plan.to_snapshot(42);
        assert_eq!(row.id, 42);
        assert_eq!(row.shop_id, 7);
        assert_eq!(row.captured_at, captured());
    }

    // --- store-backed: `DATABASE_URL=... cargo test -- --ignored`

    const SNAPSHOTS_FOR_SHOP: &str = "SELECT COUNT(*) FROM snapshots WHERE shop_id = $1";
    const ROOMS_FOR_SHOP: &str = "SELECT COUNT(*) FROM rooms WHERE shop_id = $1";
    const ROOM_SNAPSHOTS_FOR_SHOP: &str = r#"
        SELECT COUNT(*) FROM room_snapshots rs
        JOIN snapshots s ON s.id = rs.snapshot_id
        WHERE s.shop_id = $1
    "#;

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_persist_then_rollup_matches_row() {
        // ---
        let (pool, shop) = test_store::fresh_shop().await;
        let plan = SnapshotPlan::build(shop.id, captured(), "营业中", &sample_layout());

        let row = persist(&pool, &plan).await.unwrap();
        assert_eq!(row.shop_id, shop.id);
        assert_eq!(row.captured_at, captured());
        assert_eq!(count(&pool, ROOM_SNAPSHOTS_FOR_SHOP, shop.id).await, 2);

        let start = captured() - TimeDelta::minutes(1);
        let end = captured() + TimeDelta::minutes(1);
        let utc8 = FixedOffset::east_opt(8 * 3600).unwrap();
        let stats = rollup::rollup(&pool, shop.id, start, end, utc8)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.avg_usage_rate, row.usage_rate);
        assert_eq!(stats.max_usage_rate, row.usage_rate);
        assert_eq!(stats.avg_used_devices, f64::from(row.used_devices));
        assert_eq!(stats.max_used_devices, row.used_devices);
        assert_eq!(stats.total_devices, row.total_devices);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_failed_room_insert_rolls_back_snapshot() {
        // ---
        let (pool, shop) = test_store::fresh_shop().await;
        let mut plan = SnapshotPlan::build(shop.id, captured(), "营业中", &sample_layout());
        // Postgres rejects NUL in text, so the second room insert fails
        plan.rooms[1].name = "Room\0Two".to_string();

        let err = persist(&pool, &plan).await.unwrap_err();
        assert!(matches!(err, PollError::Persistence(_)), "got {err}");

        assert_eq!(count(&pool, SNAPSHOTS_FOR_SHOP, shop.id).await, 0);
        assert_eq!(count(&pool, ROOMS_FOR_SHOP, shop.id).await, 0);
        assert_eq!(count(&pool, ROOM_SNAPSHOTS_FOR_SHOP, shop.id).await, 0);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_closed_plan_writes_no_room_rows() {
        // ---
        let (pool, shop) = test_store::fresh_shop().await;
        let plan = SnapshotPlan::closed(shop.id, captured(), "休息中");

        let row = persist(&pool, &plan).await.unwrap();
        assert_eq!(row.usage_rate, None);

        assert_eq!(count(&pool, SNAPSHOTS_FOR_SHOP, shop.id).await, 1);
        assert_eq!(count(&pool, ROOM_SNAPSHOTS_FOR_SHOP, shop.id).await, 0);

        let stored = crate::db::snapshots_in_window(
            &pool,
            shop.id,
            captured() - TimeDelta::minutes(1),
            captured() + TimeDelta::minutes(1),
        )
        .await
        .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].shop_status, "休息中");
        assert_eq!((stored[0].total_devices, stored[0].used_devices), (0, 0));
        assert_eq!(stored[0].usage_rate, None);
    }
}
