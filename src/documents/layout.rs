//! Page layout: A4 pages with absolutely positioned text and rule elements.
//!
//! The builder wraps text with an average-glyph-width estimate and breaks
//! pages when the cursor would pass the bottom margin. Everything here is a
//! pure function of its input, so identical input yields identical pages.

use serde::Serialize;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_LEFT_MM: f32 = 25.0;
pub const MARGIN_RIGHT_MM: f32 = 20.0;
pub const MARGIN_TOP_MM: f32 = 20.0;
pub const MARGIN_BOTTOM_MM: f32 = 20.0;

pub const BODY_SIZE_PT: f32 = 12.0;
pub const HEADING_SIZE_PT: f32 = 16.0;
pub const SMALL_SIZE_PT: f32 = 10.0;

const PT_TO_MM: f32 = 0.3528;
const LINE_SPACING: f32 = 1.45;
const AVG_GLYPH_RATIO: f32 = 0.5;

pub fn content_width_mm() -> f32 {
    PAGE_WIDTH_MM - MARGIN_LEFT_MM - MARGIN_RIGHT_MM
}

pub fn line_height_mm(size_pt: f32) -> f32 {
    size_pt * PT_TO_MM * LINE_SPACING
}

/// How many characters of the given size fit on a line of `width_mm`.
pub fn chars_per_line(width_mm: f32, size_pt: f32) -> usize {
    let glyph = size_pt * PT_TO_MM * AVG_GLYPH_RATIO;
    ((width_mm / glyph).floor() as usize).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Weight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub size_pt: f32,
    pub weight: Weight,
    pub align: Align,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleLine {
    pub x_mm: f32,
    pub y_mm: f32,
    pub length_mm: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Text(TextBlock),
    Rule(RuleLine),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub number: usize,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaidOutDocument {
    pub title: String,
    pub pages: Vec<Page>,
}

impl LaidOutDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All text lines in reading order, one per entry.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flat_map(|page| {
            page.elements.iter().filter_map(|element| match element {
                Element::Text(block) => Some(block.text.as_str()),
                Element::Rule(_) => None,
            })
        })
    }

    pub fn plain_text(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f32,
    pub weight: Weight,
    pub align: Align,
    pub indent_mm: f32,
}

impl TextStyle {
    pub fn body() -> Self {
        Self {
            size_pt: BODY_SIZE_PT,
            weight: Weight::Regular,
            align: Align::Left,
            indent_mm: 0.0,
        }
    }

    pub fn heading() -> Self {
        Self {
            size_pt: HEADING_SIZE_PT,
            weight: Weight::Bold,
            align: Align::Center,
            indent_mm: 0.0,
        }
    }

    pub fn bold(mut self) -> Self {
        self.weight = Weight::Bold;
        self
    }

    pub fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }

    pub fn indented(mut self, indent_mm: f32) -> Self {
        self.indent_mm = indent_mm;
        self
    }
}

/// Greedy word wrap on character counts. Explicit newlines start new lines;
/// words longer than a line are split.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for segment in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in segment.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current_len += word.len();
            current.extend(word);
        }

        lines.push(current);
    }

    lines
}

pub struct LayoutBuilder {
    title: String,
    pages: Vec<Page>,
    elements: Vec<Element>,
    cursor_mm: f32,
}

impl LayoutBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pages: Vec::new(),
            elements: Vec::new(),
            cursor_mm: MARGIN_TOP_MM,
        }
    }

    pub fn heading(&mut self, text: &str) -> &mut Self {
        self.paragraph(text, TextStyle::heading())
    }

    pub fn body(&mut self, text: &str) -> &mut Self {
        self.paragraph(text, TextStyle::body())
    }

    pub fn paragraph(&mut self, text: &str, style: TextStyle) -> &mut Self {
        let width = content_width_mm() - style.indent_mm;
        let line_height = line_height_mm(style.size_pt);

        for line in wrap(text, chars_per_line(width, style.size_pt)) {
            self.ensure_room(line_height);
            if !line.is_empty() {
                self.elements.push(Element::Text(TextBlock {
                    x_mm: MARGIN_LEFT_MM + style.indent_mm,
                    y_mm: self.cursor_mm,
                    width_mm: width,
                    size_pt: style.size_pt,
                    weight: style.weight,
                    align: style.align,
                    text: line,
                }));
            }
            self.cursor_mm += line_height;
        }
        self
    }

    pub fn space(&mut self, mm: f32) -> &mut Self {
        self.cursor_mm += mm;
        self
    }

    /// Signature blocks side by side: caption, a rule to sign on, and the
    /// signer's name (or a dotted blank) under the rule.
    pub fn signatures(&mut self, blocks: &[(&str, String)]) -> &mut Self {
        if blocks.is_empty() {
            return self;
        }
        let line_height = line_height_mm(BODY_SIZE_PT);
        self.ensure_room(line_height * 3.0);

        let column = content_width_mm() / blocks.len() as f32;
        let top = self.cursor_mm;
        for (i, (caption, name)) in blocks.iter().enumerate() {
            let x = MARGIN_LEFT_MM + column * i as f32;
            let width = column - 8.0;
            self.elements.push(Element::Text(TextBlock {
                x_mm: x,
                y_mm: top,
                width_mm: width,
                size_pt: BODY_SIZE_PT,
                weight: Weight::Bold,
                align: Align::Left,
                text: caption.to_string(),
            }));
            self.elements.push(Element::Rule(RuleLine {
                x_mm: x,
                y_mm: top + line_height * 1.8,
                length_mm: width,
            }));
            self.elements.push(Element::Text(TextBlock {
                x_mm: x,
                y_mm: top + line_height * 2.0,
                width_mm: width,
                size_pt: SMALL_SIZE_PT,
                weight: Weight::Regular,
                align: Align::Center,
                text: format!("({})", name),
            }));
        }
        self.cursor_mm = top + line_height * 3.0;
        self
    }

    pub fn page_break(&mut self) -> &mut Self {
        let number = self.pages.len() + 1;
        self.pages.push(Page {
            number,
            elements: std::mem::take(&mut self.elements),
        });
        self.cursor_mm = MARGIN_TOP_MM;
        self
    }

    pub fn finish(mut self) -> LaidOutDocument {
        if !self.elements.is_empty() || self.pages.is_empty() {
            self.page_break();
        }
        LaidOutDocument {
            title: self.title,
            pages: self.pages,
        }
    }

    fn ensure_room(&mut self, height_mm: f32) {
        let limit = PAGE_HEIGHT_MM - MARGIN_BOTTOM_MM;
        if self.cursor_mm + height_mm > limit && !self.elements.is_empty() {
            self.page_break();
        }
    }
}
