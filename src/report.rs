//! Plain-text reports pushed to phones.

use crate::models::Shop;
use crate::parser::ShopAggregate;
use crate::rollup::DailyStats;

// ---

/// Report for a shop that is not operating: identity and status only.
pub fn closed_report(shop: &Shop, status: &str) -> String {
    format!(
        "Shop: {}\nAddress: {}\nStatus: {}",
        shop.name, shop.address, status
    )
}

/// Live occupancy report for one poll, rooms ordered by room code.
pub fn live_report(shop: &Shop, agg: &ShopAggregate) -> String {
    // ---
    let mut out = format!("Shop: {}\nAddress: {}\n", shop.name, shop.address);
    out.push_str(&format!(
        "Devices: {}, in use: {}\n",
        agg.total_devices, agg.used_devices
    ));
    if let Some(rate) = agg.usage_rate() {
        out.push_str(&format!("Usage: {:.2}%\n\n", rate));
    }

    out.push_str("Rooms:\n");
    for room in agg.rooms.values() {
        let Some(rate) = room.usage_rate() else {
            continue;
        };
        out.push_str(&format!(
            "{}: {:.2}% ({}/{})\n",
            room.room_name, rate, room.used_seats, room.total_seats
        ));
    }
    out
}

/// Daily rollup report with an hour table of the hours that had data.
pub fn daily_report(shop_name: &str, stats: &DailyStats) -> String {
    // ---
    let mut out = format!("[{}] Daily report\n", shop_name);
    out.push_str(&format!("Devices: {}\n", stats.total_devices));
    out.push_str(&format!("Records: {}\n", stats.record_count));
    out.push_str(&format!("Avg usage: {}\n", percent(stats.avg_usage_rate)));
    out.push_str(&format!("Peak usage: {}\n", percent(stats.max_usage_rate)));
    out.push_str(&format!("Avg in use: {:.1}\n", stats.avg_used_devices));
    out.push_str(&format!("Peak in use: {}\n", stats.max_used_devices));

    if stats.hourly.is_empty() {
        return out;
    }

    out.push_str("\n--- Hourly usage ---\n");
    out.push_str("| Hour  | Usage | In use |\n");
    for hour in 0..24 {
        let Some(h) = stats.hourly.iter().find(|h| h.hour == hour) else {
            continue;
        };
        let rate = h
            .avg_usage_rate
            .map(|r| format!("{:>4.0}%", r))
            .unwrap_or_else(|| "    -".to_string());
        out.push_str(&format!(
            "| {:02}:00 | {} | {:>6.0} |\n",
            hour, rate, h.avg_used_devices
        ));
    }
    out
}

fn percent(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.2}%", r))
        .unwrap_or_else(|| "-".to_string())
}
