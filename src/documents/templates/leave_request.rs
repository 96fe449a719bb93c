//! Молба за платен годишен отпуск (annual paid leave request).

use super::super::common::{blank, ensure_shapes, fill_placeholders, scalar_lookup};
use super::super::layout::{LaidOutDocument, LayoutBuilder, TextStyle};
use super::super::numbers::{parse_count, with_words, Gender};
use super::super::traits::DocumentDefinition;
use super::super::DocumentError;
use crate::editor::FormState;

pub const TEMPLATE_ID: &str = "leave_request";

const SCALARS: [&str; 8] = [
    "employer",
    "managerName",
    "employeeName",
    "position",
    "days",
    "startDate",
    "place",
    "signedOn",
];
const DATES: [&str; 2] = ["startDate", "signedOn"];

const ADDRESSEE: &str = "ДО\n{{managerName:40}}\nУПРАВИТЕЛ НА {{employer:40}}";
const FROM: &str = "от {{employeeName:40}}, на длъжност {{position:30}}";
const BODY: &str = "Моля да ми бъде разрешено ползването на {{days}} платен годишен отпуск, \
считано от {{startDate:14}}.";

pub struct LeaveRequest;

/// "5 (пет) работни дни"; free text is echoed, an empty value stays blank.
fn days_phrase(raw: Option<String>) -> String {
    match raw {
        None => format!("{} работни дни", blank(6)),
        Some(value) => match parse_count(&value) {
            Some(1) => format!("{} работен ден", with_words(1, Gender::Masculine)),
            Some(n) => format!("{} работни дни", with_words(n, Gender::Masculine)),
            None => value,
        },
    }
}

impl DocumentDefinition for LeaveRequest {
    fn template_id(&self) -> &'static str {
        TEMPLATE_ID
    }

    fn layout(&self, title: &str, values: &FormState) -> Result<LaidOutDocument, DocumentError> {
        ensure_shapes(values, &SCALARS, &[])?;
        let lookup = scalar_lookup(values, &DATES);
        let days = days_phrase(lookup("days"));
        let body_lookup = |key: &str| match key {
            "days" => Some(days.clone()),
            _ => lookup(key),
        };
        let mut doc = LayoutBuilder::new(title);

        doc.paragraph(
            &fill_placeholders(ADDRESSEE, &lookup),
            TextStyle::body().bold().indented(90.0),
        )
        .space(12.0);
        doc.heading("МОЛБА").space(2.0);
        doc.paragraph(&fill_placeholders(FROM, &lookup), TextStyle::body().centered())
            .space(10.0);
        doc.body("Уважаеми господин/госпожо управител,").space(4.0);
        doc.paragraph(
            &fill_placeholders(BODY, body_lookup),
            TextStyle::body().indented(10.0),
        )
        .space(16.0);

        doc.body(&fill_placeholders("Дата: {{signedOn:14}}", &lookup));
        doc.body(&fill_placeholders("гр. {{place:20}}", &lookup))
            .space(8.0);
        doc.signatures(&[(
            "С уважение:",
            lookup("employeeName").unwrap_or_else(|| blank(30)),
        )]);

        Ok(doc.finish())
    }
}
