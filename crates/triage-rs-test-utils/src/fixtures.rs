use crate::TableEmbedding;
use chrono::{Duration, TimeZone, Utc};
use triage_rs_core::TicketRow;
use triage_rs_protocol::HistoricalTicket;

/// Query text registered by [`worked_example_embedding`].
pub const WORKED_EXAMPLE_QUERY: &str = "router keeps rebooting";

/// Unit 2-d vector whose cosine distance to `[1, 0]` is `distance`.
pub fn at_cosine_distance(distance: f32) -> Vec<f32> {
    let cosine = 1.0 - distance;
    vec![cosine, (1.0 - cosine * cosine).max(0.0).sqrt()]
}

/// Tickets A (Network, 2h), C (DB, unresolved), B (Network, 6h).
pub fn worked_example_corpus() -> Vec<HistoricalTicket> {
    let opened = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).single();
    let timeline = |hours: i64| {
        opened.map(|opened| (opened, Some(opened + Duration::hours(hours))))
    };
    let mut a = HistoricalTicket::new("A", "wifi router drops connection", "Network")
        .with_solution("Reset the router");
    if let Some((opened, resolved)) = timeline(2) {
        a = a.with_timeline(opened, resolved);
    }
    let c = HistoricalTicket::new("C", "database sync stalls", "DB");
    let mut b = HistoricalTicket::new("B", "vpn tunnel flaps", "Network")
        .with_solution("Update VPN client");
    if let Some((opened, resolved)) = timeline(6) {
        b = b.with_timeline(opened, resolved);
    }
    vec![a, c, b]
}

/// Embedding placing A, C, B at cosine distances 0.1, 0.2, 0.3 from the query.
pub fn worked_example_embedding() -> TableEmbedding {
    TableEmbedding::new(2)
        .with(WORKED_EXAMPLE_QUERY, vec![1.0, 0.0])
        .with("wifi router drops connection", at_cosine_distance(0.1))
        .with("database sync stalls", at_cosine_distance(0.2))
        .with("vpn tunnel flaps", at_cosine_distance(0.3))
}

/// `count` valid rows spread over the default teams, all with resolution data.
pub fn ticket_rows(count: usize) -> Vec<TicketRow> {
    let teams = ["Software", "Network", "Device", "Account", "Payments"];
    (1..=count)
        .map(|row| {
            let team = teams[(row - 1) % teams.len()];
            let resolved = format!("2024-02-01 {:02}:00:00", 8 + row % 12);
            TicketRow::new(
                format!("T{row}"),
                format!("{team} issue number {row}"),
                team,
            )
            .with_solution(format!("fix {row}"))
            .with_dates("2024-02-01 08:00:00", Some(resolved.as_str()))
        })
        .collect()
}
