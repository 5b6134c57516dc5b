use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::rate::{PageAvailability, RateBlock};
use crate::error::{RateShopperError, Result};

const EMBEDDED_ROOMS_MARKER: &str = "b_rooms_available_and_soldout";
const CURRENCY_MARKER: &str = "b_selected_currency";

/// Elements the platform renders when nothing can be booked for the stay.
const NO_AVAILABILITY_SELECTOR: &str = "#no_availability_msg, .js-no-availability, \
     [data-component='hotel/new-rooms-table/no-availability'], [data-testid='no-availability']";

/// Extracts bookable rate blocks from a property page for one trial stay.
#[derive(Debug, Clone)]
pub struct AvailabilityParser {
    min_occupancy: u32,
    default_currency: String,
}

impl AvailabilityParser {
    pub fn new(min_occupancy: u32, default_currency: impl Into<String>) -> Self {
        Self {
            min_occupancy,
            default_currency: default_currency.into(),
        }
    }

    pub fn min_occupancy(&self) -> u32 {
        self.min_occupancy
    }

    /// Parse a fetched page.
    ///
    /// An explicit no-availability signal yields `rooms_found = false`. A page
    /// with neither that signal nor any room data is a `Parse` error, since it
    /// points at a navigation problem rather than a sold-out stay.
    pub fn parse(&self, page: &str) -> Result<PageAvailability> {
        let currency = extract_currency(page).unwrap_or_else(|| self.default_currency.clone());
        let document = Html::parse_document(page);

        if has_no_availability_signal(&document) {
            debug!("Page reports no availability");
            return Ok(PageAvailability::no_rooms());
        }

        if let Some(blocks) = try_parse_embedded_rooms(page, &currency) {
            return Ok(self.to_availability(blocks));
        }

        if let Some(blocks) = try_parse_room_table(&document, &currency) {
            return Ok(self.to_availability(blocks));
        }

        Err(RateShopperError::Parse {
            reason: "availability container not found in page".into(),
        })
    }

    fn to_availability(&self, blocks: Vec<RateBlock>) -> PageAvailability {
        if blocks.is_empty() {
            return PageAvailability::no_rooms();
        }
        PageAvailability::from_blocks(blocks, self.min_occupancy)
    }
}

fn has_no_availability_signal(document: &Html) -> bool {
    Selector::parse(NO_AVAILABILITY_SELECTOR)
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false)
}

/// Read rooms from the page's embedded `b_rooms_available_and_soldout` global.
fn try_parse_embedded_rooms(page: &str, currency: &str) -> Option<Vec<RateBlock>> {
    let start = page.find(EMBEDDED_ROOMS_MARKER)? + EMBEDDED_ROOMS_MARKER.len();
    let json_text = extract_json_array(&page[start..])?;
    let rooms: serde_json::Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Embedded rooms global is not valid JSON");
            return None;
        }
    };

    let mut blocks = Vec::new();
    for room in rooms.as_array()? {
        if room.get("b_sold_out").is_some_and(is_truthy) {
            continue;
        }
        let room_name = room
            .get("b_name")
            .or_else(|| room.get("b_room_name"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown room")
            .trim()
            .to_string();
        let Some(room_blocks) = room.get("b_blocks").and_then(|v| v.as_array()) else {
            continue;
        };
        for block in room_blocks {
            if block.get("b_sold_out").is_some_and(is_truthy) {
                continue;
            }
            let Some(total_price) = block
                .get("b_raw_price")
                .or_else(|| block.get("b_price"))
                .and_then(value_as_price)
            else {
                continue;
            };
            let max_occupancy = block
                .get("b_max_persons")
                .and_then(value_as_u32)
                .unwrap_or(0);
            blocks.push(RateBlock {
                room_name: room_name.clone(),
                max_occupancy,
                total_price,
                currency: currency.to_string(),
            });
        }
    }
    Some(blocks)
}

/// Read rooms from the rendered rooms table, one row per rate block.
fn try_parse_room_table(document: &Html, currency: &str) -> Option<Vec<RateBlock>> {
    let table_sel = Selector::parse("table#hprt-table, table.hprt-table").ok()?;
    let row_sel = Selector::parse("tr[data-block-id]").ok()?;
    let name_sel = Selector::parse(".hprt-roomtype-icon-link, .hprt-roomtype-link").ok()?;
    let occupancy_sel = Selector::parse(".hprt-occupancy-occupancy-info").ok()?;
    let icon_sel = Selector::parse(".bicon-occupancy, .c-occupancy-icon").ok()?;
    let price_sel =
        Selector::parse(".bui-price-display__value, .prco-valign-middle-helper").ok()?;

    let table = document.select(&table_sel).next()?;
    let currency = table.value().attr("data-currency").unwrap_or(currency);

    let mut blocks = Vec::new();
    // The room name cell spans every rate row of that room
    let mut current_room = String::from("Unknown room");
    for row in table.select(&row_sel) {
        if let Some(name) = row.select(&name_sel).next() {
            let text = collapse_whitespace(&name.text().collect::<String>());
            if !text.is_empty() {
                current_room = text;
            }
        }

        let Some(total_price) = row
            .select(&price_sel)
            .next()
            .and_then(|el| parse_price_string(&el.text().collect::<String>()))
        else {
            continue;
        };

        let max_occupancy = row
            .select(&occupancy_sel)
            .next()
            .map_or(0, |cell| occupancy_from_cell(cell, &icon_sel));

        blocks.push(RateBlock {
            room_name: current_room.clone(),
            max_occupancy,
            total_price,
            currency: currency.to_string(),
        });
    }
    Some(blocks)
}

fn occupancy_from_cell(cell: ElementRef<'_>, icon_sel: &Selector) -> u32 {
    if let Some(n) = cell
        .value()
        .attr("data-occupancy")
        .and_then(|v| v.trim().parse().ok())
    {
        return n;
    }
    let icons = cell.select(icon_sel).count();
    if icons > 0 {
        return u32::try_from(icons).unwrap_or(u32::MAX);
    }
    // Screen-reader text such as "Max. people: 2"
    cell.text()
        .collect::<String>()
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Slice out the first balanced `[...]` in `text`, honoring string literals.
fn extract_json_array(text: &str) -> Option<&str> {
    let open = text.find('[')?;
    // Only accept the array that directly follows `marker:` / `marker =`
    if !text[..open]
        .chars()
        .all(|c| c.is_whitespace() || c == ':' || c == '=' || c == '"' || c == '\'')
    {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[open..=open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Currency code from `b_selected_currency: 'BRL'` style globals.
fn extract_currency(page: &str) -> Option<String> {
    let start = page.find(CURRENCY_MARKER)? + CURRENCY_MARKER.len();
    let rest = &page[start..];
    let quote_pos = rest.find(['\'', '"'])?;
    // Skip the closing quote of a JSON key
    let rest = rest[quote_pos..].trim_start_matches(['\'', '"', ':', ' ']);
    let end = rest.find(['\'', '"'])?;
    let code = rest[..end].trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Some(code.to_string())
    } else {
        None
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty() && s != "0" && s != "false",
        _ => false,
    }
}

fn value_as_price(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(parse_price_string))
        .filter(|p| *p > 0.0)
}

fn value_as_u32(value: &serde_json::Value) -> Option<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a localized price: `R$ 1.234,56`, `$1,234.56`, `R$ 480`.
///
/// When both separators appear the rightmost one is the decimal mark. A lone
/// separator followed by exactly three digits is a thousands separator.
pub fn parse_price_string(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let lone_separator = |sep: char| {
        let pos = cleaned.rfind(sep).unwrap_or(0);
        let decimals = cleaned.len() - pos - 1;
        if decimals == 3 || cleaned.matches(sep).count() > 1 {
            cleaned.replace(sep, "")
        } else {
            cleaned.replace(sep, ".")
        }
    };

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => lone_separator(','),
        (Some(_), None) => lone_separator('.'),
        (None, None) => cleaned.clone(),
    };
    normalized.parse::<f64>().ok()
}
