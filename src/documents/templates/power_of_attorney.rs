//! Пълномощно (power of attorney).
//!
//! A principal authorises an agent to act on their behalf within the powers
//! listed in free text.

use super::super::common::{blank, ensure_shapes, fill_placeholders, scalar_lookup};
use super::super::layout::{LaidOutDocument, LayoutBuilder, TextStyle};
use super::super::traits::DocumentDefinition;
use super::super::DocumentError;
use crate::editor::FormState;

pub const TEMPLATE_ID: &str = "power_of_attorney";

const SCALARS: [&str; 9] = [
    "principalName",
    "principalEgn",
    "principalAddress",
    "agentName",
    "agentEgn",
    "agentAddress",
    "powers",
    "place",
    "signedOn",
];
const DATES: [&str; 1] = ["signedOn"];

const PRINCIPAL: &str = "Долуподписаният/ата {{principalName:40}}, ЕГН {{principalEgn:10}}, \
с постоянен адрес: {{principalAddress:50}},";
const AGENT: &str = "{{agentName:40}}, ЕГН {{agentEgn:10}}, \
с постоянен адрес: {{agentAddress:50}},";
const CLOSING: &str = "Пълномощникът има право да подписва всички необходими документи \
и да извършва всички необходими действия във връзка с упълномощаването.";

pub struct PowerOfAttorney;

impl DocumentDefinition for PowerOfAttorney {
    fn template_id(&self) -> &'static str {
        TEMPLATE_ID
    }

    fn layout(&self, title: &str, values: &FormState) -> Result<LaidOutDocument, DocumentError> {
        ensure_shapes(values, &SCALARS, &[])?;
        let lookup = scalar_lookup(values, &DATES);
        let mut doc = LayoutBuilder::new(title);

        doc.heading("ПЪЛНОМОЩНО").space(10.0);
        doc.body(&fill_placeholders(PRINCIPAL, &lookup)).space(4.0);
        doc.paragraph("УПЪЛНОМОЩАВАМ", TextStyle::body().bold().centered())
            .space(4.0);
        doc.body(&fill_placeholders(AGENT, &lookup));
        doc.body("със следните права:").space(2.0);

        match lookup("powers") {
            Some(powers) => {
                doc.paragraph(&powers, TextStyle::body().indented(5.0));
            }
            None => {
                for _ in 0..3 {
                    doc.paragraph(&blank(70), TextStyle::body().indented(5.0));
                }
            }
        }

        doc.space(4.0).body(CLOSING).space(12.0);
        doc.body(&fill_placeholders("Дата: {{signedOn:14}}", &lookup));
        doc.body(&fill_placeholders("гр. {{place:20}}", &lookup))
            .space(8.0);
        doc.signatures(&[(
            "Упълномощител:",
            lookup("principalName").unwrap_or_else(|| blank(30)),
        )]);

        Ok(doc.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filled_values_are_rendered() {
        let values: FormState = serde_json::from_value(json!({
            "principalName": "Иван Иванов",
            "agentName": "Петър Петров",
            "powers": "да ме представлява пред НАП",
            "signedOn": "2026-10-19",
            "place": "София"
        }))
        .unwrap();

        let text = PowerOfAttorney
            .layout("Пълномощно", &values)
            .unwrap()
            .plain_text();

        assert!(text.contains("Иван Иванов"));
        assert!(text.contains("Петър Петров"));
        assert!(text.contains("да ме представлява пред НАП"));
        assert!(text.contains("Дата: 19 октомври 2026 г."));
        assert!(text.contains("гр. София"));
        assert!(text.contains("(Иван Иванов)"));
    }

    #[test]
    fn test_empty_snapshot_renders_dotted_blanks() {
        let doc = PowerOfAttorney
            .layout("Пълномощно", &FormState::default())
            .unwrap();
        let text = doc.plain_text();

        assert!(!text.contains("{{"));
        assert!(text.contains(&format!("ЕГН {},", blank(10))));
        assert!(text.contains(&format!("Дата: {}", blank(14))));
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_list_in_scalar_slot_fails() {
        let values: FormState =
            serde_json::from_value(json!({ "principalName": [{ "x": "1" }] })).unwrap();
        let err = PowerOfAttorney.layout("Пълномощно", &values).unwrap_err();
        assert!(matches!(err, DocumentError::UnexpectedValue { .. }));
    }
}
