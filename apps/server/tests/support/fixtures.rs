use serde_json::json;
use soundshelf::db::Row;

pub fn audio_row(id: i64, title: &str) -> Row {
    let value = json!({
        "id": id,
        "title": title,
        "description": format!("Lecture recording {id}"),
        "speaker": "Ada Lovelace",
        "category": "science",
        "status": "published",
        "created_at": format!("2024-01-{:02}T10:00:00Z", (id % 28) + 1),
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!("json! object literal"),
    }
}

/// `n` rows with ids `1..=n`.
pub fn audio_rows(n: i64) -> Vec<Row> {
    (1..=n).map(|id| audio_row(id, &format!("Episode {id}"))).collect()
}

pub fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(|v| v.as_i64()))
        .collect()
}
