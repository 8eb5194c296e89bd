//! Data models: remote venue payloads and persisted rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Element code of a bookable seat carrying live occupancy.
pub const ELEMENT_SEAT: &str = "SEAT";

/// Element code of a physical private room.
pub const ELEMENT_PRIVATE_ROOM: &str = "PRIVATE_ROOM";

/// Shop status string reported while the venue is open.
pub const STATUS_OPERATING: &str = "营业中";

/// Envelope of the layout endpoint (`surf-internet/shop/v3/get`).
#[derive(Debug, Deserialize)]
pub struct LayoutResponse {
    // ---
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    pub data: LayoutData,
}

#[derive(Debug, Deserialize)]
pub struct LayoutData {
    // ---
    #[serde(deserialize_with = "null_as_default")]
    pub areas: Vec<Area>,
}

/// One floor area; relations are scoped to it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    // ---
    #[serde(default)]
    pub area_name: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub elements: Vec<Element>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relations: Vec<Relation>,
}

/// Room element `room_id` contains the listed seat elements.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    // ---
    pub room_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seat_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    // ---
    pub id: i64,
    pub element_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub no_smoking_flag: i32,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Occupancy sub-record, present on seat elements only.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    // ---
    pub room_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub room_name: String,
    /// 1 = in use, 0 = free
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: i32,
}

/// Envelope of the shop-info endpoint (`asset-svc/.../baseMessage`).
#[derive(Debug, Deserialize)]
pub struct ShopInfoResponse {
    // ---
    pub data: ShopInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopInfo {
    // ---
    #[serde(default, deserialize_with = "null_as_default")]
    pub store_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub store_address: String,
    pub shop_status: String,
}

impl ShopInfo {
    pub fn is_operating(&self) -> bool {
        self.shop_status == STATUS_OPERATING
    }
}

/// The gateway sends `null` for unset fields; read those as the type's default.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

// --- persisted rows

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Shop {
    // ---
    pub id: i64,
    pub common_code: String,
    pub name: String,
    pub address: String,
}

/// Shop-level snapshot as stored; immutable once written.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Snapshot {
    // ---
    pub id: i64,
    pub shop_id: i64,
    pub captured_at: DateTime<Utc>,
    pub shop_status: String,
    pub total_devices: i32,
    pub used_devices: i32,
    /// NULL when the shop had no devices.
    pub usage_rate: Option<f64>,
}
