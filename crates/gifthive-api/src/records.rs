//! Row → wire conversions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use gifthive_db::Database;
use gifthive_db::models::{GiftRow, HiveRow};
use gifthive_types::models::{Gift, Hive};

pub fn gift_from_row(row: GiftRow) -> Gift {
    let created_at = parse_timestamp(&row.created_at, &row.id);
    Gift {
        id: row.id,
        name: row.name,
        description: row.description,
        link: row.link,
        bought: row.bought,
        hive_id: row.hive_id,
        created_at,
    }
}

/// Attach gifts and share lists to hive rows, keeping the row order.
pub fn assemble_hives(db: &Database, rows: Vec<HiveRow>) -> anyhow::Result<Vec<Hive>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut gifts: HashMap<String, Vec<Gift>> = HashMap::new();
    for row in db.get_gifts_for_hives(&ids)? {
        gifts.entry(row.hive_id.clone()).or_default().push(gift_from_row(row));
    }

    let mut shares: HashMap<String, Vec<String>> = HashMap::new();
    for row in db.get_shares_for_hives(&ids)? {
        shares.entry(row.hive_id).or_default().push(row.username);
    }

    Ok(rows
        .into_iter()
        .map(|row| Hive {
            created_at: parse_timestamp(&row.created_at, &row.id),
            gifts: gifts.remove(&row.id).unwrap_or_default(),
            shared_with: shares.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            user_id: row.user_id,
        })
        .collect())
}

pub fn assemble_hive(db: &Database, row: HiveRow) -> anyhow::Result<Hive> {
    assemble_hives(db, vec![row])?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("hive lost during assembly"))
}

fn parse_timestamp(raw: &str, id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on record '{}': {}", raw, id, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_timestamps() {
        let ts = parse_timestamp("2026-10-16 08:30:00", "x");
        assert_eq!(ts.to_rfc3339(), "2026-10-16T08:30:00+00:00");
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("yesterday", "x"), DateTime::<Utc>::default());
    }
}
