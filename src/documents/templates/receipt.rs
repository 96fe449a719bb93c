//! Разписка (receipt for handed-over items).

use super::super::common::{blank, ensure_shapes, fill_placeholders, item_lookup, scalar_lookup};
use super::super::layout::{LaidOutDocument, LayoutBuilder, TextStyle};
use super::super::numbers::{with_words, Gender};
use super::super::traits::DocumentDefinition;
use super::super::DocumentError;
use crate::editor::{FormState, ListItem};

pub const TEMPLATE_ID: &str = "receipt";

const SCALARS: [&str; 6] = [
    "giverName",
    "giverEgn",
    "receiverName",
    "receiverEgn",
    "place",
    "signedOn",
];
const LISTS: [&str; 1] = ["items"];
const DATES: [&str; 1] = ["signedOn"];

const INTRO: &str = "Днес, {{signedOn:14}}, в гр. {{place:20}}, долуподписаният/ата \
{{receiverName:40}}, ЕГН {{receiverEgn:10}}, получих от {{giverName:40}}, \
ЕГН {{giverEgn:10}}, следното:";
const ITEM: &str = "{{description:40}}, количество {{quantity:6}}, стойност {{value:10}}";

pub struct Receipt;

/// A record counts towards the total once any of its sub-fields is filled.
fn is_filled(item: &ListItem) -> bool {
    item.values().any(|v| !v.trim().is_empty())
}

fn total_line(filled: usize) -> String {
    match filled {
        0 => format!("Общо: {} позиции.", blank(8)),
        1 => format!("Общо: {} позиция.", with_words(1, Gender::Feminine)),
        n => format!(
            "Общо: {} позиции.",
            with_words(u32::try_from(n).unwrap_or(u32::MAX), Gender::Feminine)
        ),
    }
}

impl DocumentDefinition for Receipt {
    fn template_id(&self) -> &'static str {
        TEMPLATE_ID
    }

    fn layout(&self, title: &str, values: &FormState) -> Result<LaidOutDocument, DocumentError> {
        ensure_shapes(values, &SCALARS, &LISTS)?;
        let lookup = scalar_lookup(values, &DATES);
        let mut doc = LayoutBuilder::new(title);

        doc.heading("РАЗПИСКА").space(10.0);
        doc.body(&fill_placeholders(INTRO, &lookup)).space(4.0);

        let items = values.list("items");
        for (i, item) in items.iter().enumerate() {
            let line = fill_placeholders(ITEM, item_lookup(item));
            doc.paragraph(&format!("{}. {}", i + 1, line), TextStyle::body().indented(5.0));
        }

        let filled = items.iter().filter(|item| is_filled(item)).count();
        doc.space(4.0).body(&total_line(filled)).space(16.0);

        doc.signatures(&[
            (
                "Предал:",
                lookup("giverName").unwrap_or_else(|| blank(30)),
            ),
            (
                "Получил:",
                lookup("receiverName").unwrap_or_else(|| blank(30)),
            ),
        ]);

        Ok(doc.finish())
    }
}
