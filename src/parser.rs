//! Spatial graph parser: venue layout payload → room and shop occupancy.
//!
//! The layout is organized by area, but aggregation is shop-wide. Two passes:
//! the first merges every area's room→seats relations and collects physical
//! room attributes, the second walks seats and counts them per `roomCode`.
//! Area and element order from the payload is preserved so the
//! first-seen room name is deterministic.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::{PollError, PollResult};
use crate::models::{LayoutData, LayoutResponse, ELEMENT_PRIVATE_ROOM, ELEMENT_SEAT};

// ---

/// Physical attributes of a private-room element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalAttrs {
    pub no_smoking: i32,
    pub width: f64,
    pub height: f64,
}

/// Per-`roomCode` seat counts.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomAggregate {
    // ---
    pub room_name: String,
    pub total_seats: i32,
    pub used_seats: i32,
    /// Room element owning the first seat seen for this code, if related.
    pub physical_room_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShopAggregate {
    // ---
    pub total_devices: i32,
    pub used_devices: i32,
    /// Keyed by `roomCode`; ordered so renders and writes are deterministic.
    pub rooms: BTreeMap<String, RoomAggregate>,
}

/// Everything one layout payload yields.
#[derive(Debug, Clone, Default)]
pub struct ParsedLayout {
    // ---
    pub shop: ShopAggregate,
    pub room_names: HashMap<String, String>,
    pub physical_attrs: HashMap<i64, PhysicalAttrs>,
}

impl ShopAggregate {
    /// Percentage of devices in use, `None` when the shop has no devices.
    pub fn usage_rate(&self) -> Option<f64> {
        usage_rate(self.used_devices, self.total_devices)
    }

    /// Room totals add up to the shop totals and no room is over-used.
    pub fn is_consistent(&self) -> bool {
        // ---
        let (total, used) = self
            .rooms
            .values()
            .fold((0, 0), |(t, u), r| (t + r.total_seats, u + r.used_seats));

        total == self.total_devices
            && used == self.used_devices
            && self.rooms.values().all(|r| r.used_seats <= r.total_seats)
    }
}

impl RoomAggregate {
    pub fn usage_rate(&self) -> Option<f64> {
        usage_rate(self.used_seats, self.total_seats)
    }
}

/// `used / total * 100`, undefined for an empty total.
pub fn usage_rate(used: i32, total: i32) -> Option<f64> {
    // ---
    if total <= 0 {
        return None;
    }
    Some(f64::from(used) / f64::from(total) * 100.0)
}

// ---

/// Decode a raw layout response body and aggregate it.
///
/// A missing structural field or a non-zero remote `code` is a
/// [`PollError::Parse`].
pub fn parse(body: &str) -> PollResult<ParsedLayout> {
    // ---
    let response: LayoutResponse = serde_json::from_str(body)?;

    if response.code != 0 {
        let message = response
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| "no message".to_string());
        return Err(PollError::Parse(format!(
            "remote returned code {}: {}",
            response.code, message
        )));
    }

    Ok(aggregate(&response.data))
}

/// Aggregate an already decoded layout.
pub fn aggregate(layout: &LayoutData) -> ParsedLayout {
    // ---
    // Pass 1: physical room attributes and merged relations
    let mut physical_attrs: HashMap<i64, PhysicalAttrs> = HashMap::new();
    let mut relations: HashMap<i64, Vec<i64>> = HashMap::new();

    for area in &layout.areas {
        for element in &area.elements {
            if element.element_code == ELEMENT_PRIVATE_ROOM {
                physical_attrs.insert(
                    element.id,
                    PhysicalAttrs {
                        no_smoking: element.no_smoking_flag,
                        width: element.width,
                        height: element.height,
                    },
                );
            }
        }
        for relation in &area.relations {
            relations
                .entry(relation.room_id)
                .or_default()
                .extend_from_slice(&relation.seat_ids);
        }
    }

    let seat_to_room: HashMap<i64, i64> = relations
        .iter()
        .flat_map(|(room_id, seats)| seats.iter().map(move |seat| (*seat, *room_id)))
        .collect();

    // Pass 2: seat counts
    let mut shop = ShopAggregate::default();
    let mut room_names: HashMap<String, String> = HashMap::new();

    for area in &layout.areas {
        debug!(
            area = area.area_name.as_deref().unwrap_or("-"),
            elements = area.elements.len(),
            "Aggregating area"
        );

        for element in &area.elements {
            if element.element_code != ELEMENT_SEAT {
                continue;
            }
            let Some(info) = element.client_info.as_ref() else {
                continue;
            };

            room_names
                .entry(info.room_code.clone())
                .or_insert_with(|| info.room_name.clone());

            let room = shop
                .rooms
                .entry(info.room_code.clone())
                .or_insert_with(|| RoomAggregate {
                    room_name: info.room_name.clone(),
                    total_seats: 0,
                    used_seats: 0,
                    physical_room_id: seat_to_room.get(&element.id).copied(),
                });

            shop.total_devices += 1;
            room.total_seats += 1;
            if info.status == 1 {
                shop.used_devices += 1;
                room.used_seats += 1;
            }
        }
    }

    if !shop.is_consistent() {
        warn!(
            total = shop.total_devices,
            used = shop.used_devices,
            "Room totals disagree with shop totals"
        );
    }

    ParsedLayout {
        shop,
        room_names,
        physical_attrs,
    }
}
