//! Common utilities for document generation.
//!
//! Shared helpers for placeholder filling, Bulgarian date formatting,
//! filename building and Typst escaping.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;

use super::DocumentError;
use crate::editor::{FieldValue, FormState, ListItem};

/// Width of the dotted fallback when a placeholder does not name one.
pub const DEFAULT_BLANK_WIDTH: usize = 20;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z][A-Za-z0-9_]*)\s*(?::\s*(\d+))?\s*\}\}")
            .expect("placeholder pattern is valid");
}

const MONTHS: [&str; 12] = [
    "януари",
    "февруари",
    "март",
    "април",
    "май",
    "юни",
    "юли",
    "август",
    "септември",
    "октомври",
    "ноември",
    "декември",
];

/// Format a date the Bulgarian way (e.g. "19 октомври 2026 г.").
pub fn format_bulgarian_date(date: NaiveDate) -> String {
    let month = MONTHS[(date.month0() as usize).min(MONTHS.len() - 1)];
    format!("{} {} {} г.", date.day(), month, date.year())
}

/// Echo a supplied date value: ISO (`2026-10-19`) and dotted (`19.10.2026`)
/// dates are reformatted, anything else is shown as typed.
pub fn echo_date(value: &str) -> String {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d.%m.%Y"))
        .map(format_bulgarian_date)
        .unwrap_or_else(|_| trimmed.to_string())
}

/// A run of dots standing in for an empty field.
pub fn blank(width: usize) -> String {
    ".".repeat(width.max(1))
}

pub fn value_or_blank(value: &str, width: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        blank(width)
    } else {
        trimmed.to_string()
    }
}

/// Replace every `{{field}}` / `{{field:width}}` placeholder with the value
/// returned by `lookup`, or with a dotted blank when it returns `None`.
pub fn fill_placeholders<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let width = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(DEFAULT_BLANK_WIDTH);
            match lookup(&caps[1]) {
                Some(value) if !value.trim().is_empty() => value,
                _ => blank(width),
            }
        })
        .into_owned()
}

/// Lookup over the scalar fields of a snapshot. Fields listed in
/// `date_fields` are echoed through [`echo_date`].
pub fn scalar_lookup<'a>(
    values: &'a FormState,
    date_fields: &'a [&'a str],
) -> impl Fn(&str) -> Option<String> + 'a {
    move |key| {
        let raw = values.text(key).trim();
        if raw.is_empty() {
            None
        } else if date_fields.iter().any(|d| *d == key) {
            Some(echo_date(raw))
        } else {
            Some(raw.to_string())
        }
    }
}

/// Lookup over the sub-fields of one list record.
pub fn item_lookup(item: &ListItem) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| {
        item.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Fail when a snapshot holds a value of the wrong shape for a field the
/// layout reads. Absent fields are fine and render as blanks.
pub fn ensure_shapes(
    values: &FormState,
    scalars: &[&str],
    lists: &[&str],
) -> Result<(), DocumentError> {
    for id in scalars {
        if let Some(FieldValue::List(_)) = values.get(id) {
            return Err(DocumentError::UnexpectedValue {
                field: id.to_string(),
                expected: "text",
            });
        }
    }
    for id in lists {
        if let Some(FieldValue::Text(_)) = values.get(id) {
            return Err(DocumentError::UnexpectedValue {
                field: id.to_string(),
                expected: "list",
            });
        }
    }
    Ok(())
}

/// Escape special characters for Typst strings.
pub fn escape_typst_string(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\n', r"\n")
}

/// Latin transliteration of Bulgarian text (official streamlined system).
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        let latin = match lower {
            'а' => "a",
            'б' => "b",
            'в' => "v",
            'г' => "g",
            'д' => "d",
            'е' => "e",
            'ж' => "zh",
            'з' => "z",
            'и' => "i",
            'й' => "y",
            'к' => "k",
            'л' => "l",
            'м' => "m",
            'н' => "n",
            'о' => "o",
            'п' => "p",
            'р' => "r",
            'с' => "s",
            'т' => "t",
            'у' => "u",
            'ф' => "f",
            'х' => "h",
            'ц' => "ts",
            'ч' => "ch",
            'ш' => "sh",
            'щ' => "sht",
            'ъ' => "a",
            'ь' => "y",
            'ю' => "yu",
            'я' => "ya",
            _ => {
                out.push(ch);
                continue;
            }
        };
        if ch != lower {
            let mut chars = latin.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.push_str(chars.as_str());
            }
        } else {
            out.push_str(latin);
        }
    }
    out
}

/// Sanitize a string for use in filenames. Cyrillic is transliterated first.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let mut result = String::new();
    let mut last_dash = false;

    for ch in transliterate(name.trim()).chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !last_dash && !result.is_empty()
        {
            result.push('-');
            last_dash = true;
        }
    }

    if result.is_empty() {
        return fallback.to_string();
    }

    result.trim_matches('-').to_string()
}

/// Download filename built from the document title and a date.
pub fn export_filename(title: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}.pdf",
        sanitize_filename(title, "dokument"),
        date.format("%Y-%m-%d")
    )
}

/// Get the static assets directory path.
pub fn get_static_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fill_placeholders_with_values_and_blanks() {
        let text = "Аз, {{name:10}}, с адрес {{address}}.";
        let filled = fill_placeholders(text, |key| match key {
            "name" => Some("Иван Петров".to_string()),
            _ => None,
        });
        assert_eq!(filled, format!("Аз, Иван Петров, с адрес {}.", blank(20)));
    }

    #[test]
    fn test_whitespace_value_falls_back_to_dots() {
        let filled = fill_placeholders("{{x:5}}", |_| Some("   ".to_string()));
        assert_eq!(filled, ".....");
    }

    #[test]
    fn test_echo_date_formats() {
        assert_eq!(echo_date("2026-10-19"), "19 октомври 2026 г.");
        assert_eq!(echo_date("01.03.2025"), "1 март 2025 г.");
        assert_eq!(echo_date("есента"), "есента");
    }

    #[test]
    fn test_scalar_lookup_reads_dates_and_text() {
        let values: FormState =
            serde_json::from_value(json!({ "name": " Мария ", "signedOn": "2026-01-05", "empty": "" }))
                .unwrap();
        let lookup = scalar_lookup(&values, &["signedOn"]);
        assert_eq!(lookup("name").as_deref(), Some("Мария"));
        assert_eq!(lookup("signedOn").as_deref(), Some("5 януари 2026 г."));
        assert_eq!(lookup("empty"), None);
        assert_eq!(lookup("missing"), None);
    }

    #[test]
    fn test_ensure_shapes_rejects_wrong_value_kind() {
        let values: FormState =
            serde_json::from_value(json!({ "name": [], "items": "x" })).unwrap();
        assert!(ensure_shapes(&values, &["name"], &[]).is_err());
        assert!(ensure_shapes(&values, &[], &["items"]).is_err());
        assert!(ensure_shapes(&values, &["other"], &["another"]).is_ok());
    }

    #[test]
    fn test_transliterate_and_sanitize() {
        assert_eq!(transliterate("Пълномощно"), "Palnomoshtno");
        assert_eq!(transliterate("Юлия Щерева"), "Yuliya Shtereva");
        assert_eq!(sanitize_filename("Молба за отпуск", "x"), "molba-za-otpusk");
        assert_eq!(sanitize_filename("  ", "fallback"), "fallback");
    }

    #[test]
    fn test_export_filename_uses_title_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(export_filename("Разписка", date), "razpiska-2026-10-19.pdf");
    }
}
