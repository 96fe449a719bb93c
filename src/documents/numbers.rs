//! Bulgarian cardinal numbers in words.
//!
//! Only 0..=99 are spelled out; larger numbers stay as digits.

/// Grammatical gender of the counted noun. Only "one" and "two" change form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Masculine,
    Feminine,
    Neuter,
}

pub const MAX_SPELLED: u32 = 99;

const UNITS: [&str; 20] = [
    "нула",
    "един",
    "два",
    "три",
    "четири",
    "пет",
    "шест",
    "седем",
    "осем",
    "девет",
    "десет",
    "единадесет",
    "дванадесет",
    "тринадесет",
    "четиринадесет",
    "петнадесет",
    "шестнадесет",
    "седемнадесет",
    "осемнадесет",
    "деветнадесет",
];

const TENS: [&str; 10] = [
    "",
    "",
    "двадесет",
    "тридесет",
    "четиридесет",
    "петдесет",
    "шестдесет",
    "седемдесет",
    "осемдесет",
    "деветдесет",
];

fn unit(n: u32, gender: Gender) -> &'static str {
    match (n, gender) {
        (1, Gender::Feminine) => "една",
        (1, Gender::Neuter) => "едно",
        (2, Gender::Feminine) | (2, Gender::Neuter) => "две",
        _ => UNITS[n as usize],
    }
}

/// Words for `n`, or `None` when `n` is above [`MAX_SPELLED`].
pub fn cardinal_words(n: u32, gender: Gender) -> Option<String> {
    match n {
        0..=19 => Some(unit(n, gender).to_string()),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            let rest = n % 10;
            if rest == 0 {
                Some(tens.to_string())
            } else {
                Some(format!("{} и {}", tens, unit(rest, gender)))
            }
        }
        _ => None,
    }
}

/// Digits followed by the words in parentheses, e.g. `5 (пет)`.
/// Numbers above [`MAX_SPELLED`] render as digits only.
pub fn with_words(n: u32, gender: Gender) -> String {
    match cardinal_words(n, gender) {
        Some(words) => format!("{} ({})", n, words),
        None => n.to_string(),
    }
}

/// Parse a whole, non-negative number typed into a text field.
pub fn parse_count(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}
