//! eSuds status page scraper
//!
//! The provider serves an HTML table per room; each machine is a `<tr>` with
//! class `even` or `odd` holding id, number, type, status and minutes left.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::{FetchError, MachineGetter};
use crate::logging::elapsed_millis;
use crate::models::machine::{Machine, MachineStatus, MachineType, NO_ESUDS_ID};

const ROOM_PARAM: &str = "bottomLocationId";

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)xmlns="[^"]*"|<!DOCTYPE[^>]*>|<script[^>]*>.*?</script>|&nbsp;"#)
        .expect("noise pattern is valid")
});
static ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<tr[^>]*\bclass\s*=\s*["']?(?:even|odd)["']?[^>]*>(.*?)</tr>"#)
        .expect("row pattern is valid")
});
static CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("cell pattern is valid"));
static INPUT_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<input[^>]*\bvalue\s*=\s*["']?([^"'\s>]*)"#).expect("input pattern is valid")
});
static FONT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<font[^>]*>(.*?)</font>").expect("font pattern is valid"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Fetches and parses the eSuds room status page
#[derive(Debug, Clone)]
pub struct EsudsMachineGetter {
    client: reqwest::Client,
    base_url: Url,
}

impl EsudsMachineGetter {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn room_url(&self, room_id: i64) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair(ROOM_PARAM, &room_id.to_string());
        url
    }

    async fn download(&self, room_id: i64) -> Result<String, FetchError> {
        let started = Instant::now();
        let response = self.client.get(self.room_url(room_id)).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                room_id,
                status: response.status().as_u16(),
            });
        }
        let html = response.text().await?;
        debug!(
            room_id,
            bytes = html.len(),
            duration_ms = elapsed_millis(started),
            "Downloaded eSuds status page"
        );
        Ok(html)
    }
}

#[async_trait]
impl MachineGetter for EsudsMachineGetter {
    fn name(&self) -> &'static str {
        "esuds"
    }

    async fn get_machines(&self, room_id: i64) -> Result<Vec<Machine>, FetchError> {
        let html = self.download(room_id).await?;
        let started = Instant::now();
        let machines = parse_room_page(room_id, &html);
        match &machines {
            Ok(machines) => debug!(
                room_id,
                machines = machines.len(),
                duration_ms = elapsed_millis(started),
                "Parsed eSuds status page"
            ),
            Err(e) => warn!(room_id, error = %e, "Wrong format when parsing eSuds page"),
        }
        machines
    }
}

/// Parse every machine row of a status page
pub fn parse_room_page(room_id: i64, html: &str) -> Result<Vec<Machine>, FetchError> {
    let cleaned = NOISE.replace_all(html, "");
    ROW.captures_iter(&cleaned)
        .map(|row| parse_row(room_id, &row[1]))
        .collect()
}

fn parse_row(room_id: i64, row: &str) -> Result<Machine, FetchError> {
    let cells: Vec<&str> = CELL
        .captures_iter(row)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if cells.len() < 5 {
        return Err(FetchError::Format {
            room_id,
            message: format!("expected 5 cells per machine row, found {}", cells.len()),
        });
    }

    let esuds_id = INPUT_VALUE
        .captures(cells[0])
        .and_then(|c| c[1].parse::<i64>().ok())
        .unwrap_or(NO_ESUDS_ID);
    let num = text_of(cells[1]).parse::<i32>().unwrap_or(-1);
    let machine_type = MachineType::parse_label(&text_of(cells[2]));
    let status_text = FONT
        .captures(cells[3])
        .map_or_else(|| text_of(cells[3]), |c| text_of(&c[1]));
    let status = MachineStatus::parse_label(&status_text);
    let time_remaining = parse_minutes(&text_of(cells[4]));

    Ok(Machine::new(room_id, esuds_id, num, machine_type).with_status(status, time_remaining))
}

fn text_of(fragment: &str) -> String {
    TAG.replace_all(fragment, "").trim().to_string()
}

/// Minutes as a decimal string, converted to whole seconds
fn parse_minutes(text: &str) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    match text.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(minutes) if minutes.is_finite() && minutes >= 0.0 => Some((minutes * 60.0) as u64),
        _ => {
            debug!(text, "Unknown time remaining");
            None
        }
    }
}
