//! Color tokens used by backgrounds and entity payloads.

use veml_schema::Rgba;

/// Keywords accepted in place of a hex color.
pub const NAMED_COLORS: &[(&str, Rgba)] = &[
    ("black", Rgba::new(0.0, 0.0, 0.0, 1.0)),
    ("white", Rgba::new(1.0, 1.0, 1.0, 1.0)),
    ("red", Rgba::new(1.0, 0.0, 0.0, 1.0)),
    ("green", Rgba::new(0.0, 1.0, 0.0, 1.0)),
    ("blue", Rgba::new(0.0, 0.0, 1.0, 1.0)),
    ("yellow", Rgba::new(1.0, 0.92, 0.016, 1.0)),
    ("cyan", Rgba::new(0.0, 1.0, 1.0, 1.0)),
    ("magenta", Rgba::new(1.0, 0.0, 1.0, 1.0)),
    ("gray", Rgba::new(0.5, 0.5, 0.5, 1.0)),
    ("grey", Rgba::new(0.5, 0.5, 0.5, 1.0)),
    ("clear", Rgba::new(0.0, 0.0, 0.0, 0.0)),
];

pub fn named_color(name: &str) -> Option<Rgba> {
    NAMED_COLORS
        .iter()
        .find(|(keyword, _)| keyword.eq_ignore_ascii_case(name))
        .map(|(_, color)| *color)
}

/// Parses `#RRGGBB` or `#RRGGBBAA` (the `#` is optional). Anything else,
/// including a wrong digit count, yields [`Rgba::NEUTRAL_GRAY`].
pub fn parse_color(token: &str) -> Rgba {
    parse_hex(token).unwrap_or(Rgba::NEUTRAL_GRAY)
}

fn parse_hex(token: &str) -> Option<Rgba> {
    let digits = token.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if !digits.is_ascii() || !(digits.len() == 6 || digits.len() == 8) {
        return None;
    }
    let channel = |index: usize| -> Option<f32> {
        u8::from_str_radix(&digits[index..index + 2], 16)
            .ok()
            .map(|value| f32::from(value) / 255.0)
    };
    let alpha = if digits.len() == 8 { channel(6)? } else { 1.0 };
    Some(Rgba::new(channel(0)?, channel(2)?, channel(4)?, alpha))
}

/// How a `color` background token is to be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundToken<'a> {
    Keyword(Rgba),
    Hex(Rgba),
    /// Relative or absolute texture URI, still unresolved.
    Texture(&'a str),
}

pub fn classify_background(token: &str) -> BackgroundToken<'_> {
    let trimmed = token.trim();
    if let Some(color) = named_color(trimmed) {
        BackgroundToken::Keyword(color)
    } else if trimmed.starts_with('#') {
        BackgroundToken::Hex(parse_color(trimmed))
    } else {
        BackgroundToken::Texture(trimmed)
    }
}
