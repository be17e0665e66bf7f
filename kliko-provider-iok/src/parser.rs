//! Extraction of per-day waste types from a calendar page.
//!
//! Expected shape:
//!
//! ```html
//! <div class="iokcalendar"><div><table>
//!   <tr>
//!     <td class="other-month">30</td>
//!     <td class="weekday"><span>5</span><div><a href="...">Papier</a></div></td>
//!   </tr>
//! </table></div></div>
//! ```
//!
//! Any deviation from the container/table/day-cell structure is reported as a
//! [`ParseError`] instead of an empty month.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

use kliko_core::ports::ParseError;

/// Waste type labels per day of month, in page order.
pub type MonthCalendar = BTreeMap<u32, Vec<String>>;

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.iokcalendar").expect("static selector"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("static selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("static selector"));
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("static selector"));

const DAY_CELL_CLASSES: [&str; 2] = ["weekday", "weekend"];

enum CellPart<'a> {
    Text(&'a str),
    Element(ElementRef<'a>),
}

/// Parse one calendar page into a day → waste types mapping.
///
/// Days without pickups map to an empty list.
///
/// # Errors
///
/// Returns a [`ParseError`] when the calendar container, its table, or any day
/// cell is missing, or when a day cell cannot be read.
pub fn parse_calendar(document: &str) -> Result<MonthCalendar, ParseError> {
    let html = Html::parse_document(document);

    let container = html
        .select(&CONTAINER)
        .next()
        .ok_or(ParseError::MissingCalendar)?;
    let table = container
        .select(&TABLE)
        .next()
        .ok_or(ParseError::MissingTable)?;

    let mut rows = table.select(&ROW).peekable();
    if rows.peek().is_none() {
        return Err(ParseError::MissingRows);
    }

    let mut calendar = MonthCalendar::new();
    for row in rows {
        for cell in row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|element| element.value().name() == "td")
            .filter(is_day_cell)
        {
            let (day, waste_types) = parse_day_cell(cell)?;
            match calendar.entry(day) {
                Entry::Vacant(slot) => {
                    slot.insert(waste_types);
                }
                Entry::Occupied(_) => return Err(ParseError::DuplicateDay(day)),
            }
        }
    }

    if calendar.is_empty() {
        return Err(ParseError::MissingDayCells);
    }
    Ok(calendar)
}

fn is_day_cell(cell: &ElementRef<'_>) -> bool {
    cell.value()
        .classes()
        .any(|class| DAY_CELL_CLASSES.contains(&class))
}

fn parse_day_cell(cell: ElementRef<'_>) -> Result<(u32, Vec<String>), ParseError> {
    let mut parts = cell.children().filter_map(|node| match node.value() {
        Node::Text(text) if !text.trim().is_empty() => Some(CellPart::Text(&**text)),
        Node::Element(_) => ElementRef::wrap(node).map(CellPart::Element),
        _ => None,
    });

    let day_text = match parts.next() {
        Some(CellPart::Text(text)) => text.trim().to_owned(),
        Some(CellPart::Element(element)) => normalized_text(element),
        None => return Err(ParseError::MissingDayNumber),
    };
    let day = day_text
        .parse::<u32>()
        .ok()
        .filter(|day| (1..=31).contains(day))
        .ok_or(ParseError::InvalidDayNumber(day_text))?;

    let mut waste_types = Vec::new();
    for part in parts {
        // Stray text after the day number carries no pickup.
        let CellPart::Element(entry) = part else {
            continue;
        };
        let label = entry
            .select(&LINK)
            .next()
            .map_or_else(|| normalized_text(entry), normalized_text);
        if label.is_empty() {
            return Err(ParseError::EmptyWasteLabel(day));
        }
        waste_types.push(label);
    }

    Ok((day, waste_types))
}

fn normalized_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body><main>
            <div class="iokcalendar"><div class="calendar-wrapper"><table>
            <thead><tr><th>ma</th><th>di</th><th>wo</th><th>do</th><th>vr</th><th>za</th><th>zo</th></tr></thead>
            <tbody>{rows}</tbody>
            </table></div></div>
            </main></body></html>"#
        )
    }

    fn labels(calendar: &MonthCalendar, day: u32) -> Vec<&str> {
        calendar
            .get(&day)
            .map(|types| types.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn weekday_cell_yields_labels_in_order() {
        let document = page(
            r#"<tr><td class="weekday"><span>5</span><div class="afval"><a href="/papier">Paper</a></div><div class="afval"><a href="/glas">Glass</a></div></td></tr>"#,
        );

        let calendar = parse_calendar(&document).expect("valid calendar");
        assert_eq!(labels(&calendar, 5), ["Paper", "Glass"]);
    }

    #[test]
    fn skips_padding_cells_and_reads_weekends() {
        let document = page(
            r#"<tr>
                <td class="other-month">30</td>
                <td class="other-month">31</td>
                <td class="weekday">1</td>
                <td class="weekend calendar-day">2<div><a>Rest</a></div></td>
            </tr>"#,
        );

        let calendar = parse_calendar(&document).expect("valid calendar");
        assert_eq!(calendar.keys().copied().collect::<Vec<_>>(), [1, 2]);
        assert!(labels(&calendar, 1).is_empty(), "day 1 has no pickups");
        assert_eq!(labels(&calendar, 2), ["Rest"]);
    }

    #[test]
    fn keeps_duplicate_waste_types() {
        let document = page(
            r#"<tr><td class="weekday">12<div><a>GFT</a></div><div><a>GFT</a></div></td></tr>"#,
        );

        let calendar = parse_calendar(&document).expect("valid calendar");
        assert_eq!(labels(&calendar, 12), ["GFT", "GFT"]);
    }

    #[test]
    fn entry_without_link_uses_its_own_text() {
        let document = page(
            r#"<tr><td class="weekday">3<span class="afval">  Grof
                vuil </span></td></tr>"#,
        );

        let calendar = parse_calendar(&document).expect("valid calendar");
        assert_eq!(labels(&calendar, 3), ["Grof vuil"]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let document = page(
            r#"<tr><td class="weekday">5<div><a>Papier</a></div></td><td class="weekend">6</td></tr>"#,
        );

        assert_eq!(parse_calendar(&document), parse_calendar(&document));
    }

    #[test]
    fn missing_container_is_reported() {
        let document = "<html><body><p>Kies eerst uw adres.</p></body></html>";
        assert_eq!(parse_calendar(document), Err(ParseError::MissingCalendar));
    }

    #[test]
    fn container_without_table_is_reported() {
        let document = r#"<div class="iokcalendar"><div>leeg</div></div>"#;
        assert_eq!(parse_calendar(document), Err(ParseError::MissingTable));
    }

    #[test]
    fn table_without_day_cells_is_reported() {
        let document = page(r#"<tr><td class="other-month">30</td></tr>"#);
        assert_eq!(parse_calendar(&document), Err(ParseError::MissingDayCells));
    }

    #[test]
    fn non_numeric_day_is_reported() {
        let document = page(r#"<tr><td class="weekday">vijf</td></tr>"#);
        assert_eq!(
            parse_calendar(&document),
            Err(ParseError::InvalidDayNumber("vijf".to_owned()))
        );
    }

    #[test]
    fn empty_day_cell_is_reported() {
        let document = page(r#"<tr><td class="weekday">  </td></tr>"#);
        assert_eq!(parse_calendar(&document), Err(ParseError::MissingDayNumber));
    }

    #[test]
    fn repeated_day_is_reported() {
        let document = page(r#"<tr><td class="weekday">4</td><td class="weekday">4</td></tr>"#);
        assert_eq!(parse_calendar(&document), Err(ParseError::DuplicateDay(4)));
    }

    #[test]
    fn empty_label_is_reported() {
        let document = page(r#"<tr><td class="weekday">9<div><a> </a></div></td></tr>"#);
        assert_eq!(parse_calendar(&document), Err(ParseError::EmptyWasteLabel(9)));
    }
}
