//! Locale-aware conversion between raw scalar text and Rust values.

use num_bigint::BigInt;

/// Number separators used when reading and writing scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    pub decimal: char,
    pub grouping: Option<char>,
}

impl Locale {
    /// `.` for decimals, `,` for digit groups.
    pub const INVARIANT: Locale = Locale {
        decimal: '.',
        grouping: Some(','),
    };

    pub const fn new(decimal: char, grouping: Option<char>) -> Self {
        Self { decimal, grouping }
    }

    /// Rewrite `raw` into the form Rust's parsers accept.
    fn normalize(&self, raw: &str) -> String {
        raw.trim()
            .chars()
            .filter(|c| Some(*c) != self.grouping)
            .map(|c| if c == self.decimal { '.' } else { c })
            .collect()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::INVARIANT
    }
}

/// How numbers are rendered when written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalarFormat {
    /// Fixed number of fraction digits.
    pub precision: Option<usize>,
    /// Separate digit groups with the locale's grouping character.
    pub grouped: bool,
}

impl ScalarFormat {
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn grouped(mut self) -> Self {
        self.grouped = true;
        self
    }
}

/// A type that can be stored as a raw scalar.
pub trait Scalar {
    /// Render to raw text.
    fn render(&self, format: &ScalarFormat, locale: &Locale) -> String;

    /// Parse raw text, or `None` when it is not a valid `Self`.
    fn parse_raw(raw: &str, locale: &Locale) -> Option<Self>
    where
        Self: Sized;
}

/// Apply grouping and the locale's decimal separator to a number that Rust
/// formatted as `-1234.5`.
fn localize(text: &str, format: &ScalarFormat, locale: &Locale) -> String {
    let (int, frac) = match text.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (text, None),
    };
    let int = match (format.grouped, locale.grouping) {
        (true, Some(sep)) => group_digits(int, sep),
        _ => int.to_string(),
    };
    match frac {
        Some(frac) => format!("{}{}{}", int, locale.decimal, frac),
        None => int,
    }
}

fn group_digits(digits: &str, sep: char) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let len = digits.len();
    let mut out = String::from(sign);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

macro_rules! integer_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            fn render(&self, format: &ScalarFormat, locale: &Locale) -> String {
                let mut text = self.to_string();
                if let Some(precision) = format.precision.filter(|p| *p > 0) {
                    text.push('.');
                    text.push_str(&"0".repeat(precision));
                }
                localize(&text, format, locale)
            }

            fn parse_raw(raw: &str, locale: &Locale) -> Option<Self> {
                locale.normalize(raw).parse().ok()
            }
        }
    )*};
}

macro_rules! float_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            fn render(&self, format: &ScalarFormat, locale: &Locale) -> String {
                if !self.is_finite() {
                    return self.to_string();
                }
                let text = match format.precision {
                    Some(precision) => format!("{:.*}", precision, self),
                    None => self.to_string(),
                };
                localize(&text, format, locale)
            }

            fn parse_raw(raw: &str, locale: &Locale) -> Option<Self> {
                locale.normalize(raw).parse().ok()
            }
        }
    )*};
}

integer_scalar!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
float_scalar!(f32, f64);

impl Scalar for BigInt {
    fn render(&self, format: &ScalarFormat, locale: &Locale) -> String {
        localize(&self.to_string(), &ScalarFormat { precision: None, ..*format }, locale)
    }

    fn parse_raw(raw: &str, locale: &Locale) -> Option<Self> {
        locale.normalize(raw).parse().ok()
    }
}

impl Scalar for bool {
    fn render(&self, _: &ScalarFormat, _: &Locale) -> String {
        self.to_string()
    }

    fn parse_raw(raw: &str, _: &Locale) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}

impl Scalar for String {
    fn render(&self, _: &ScalarFormat, _: &Locale) -> String {
        self.clone()
    }

    fn parse_raw(raw: &str, _: &Locale) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl Scalar for char {
    fn render(&self, _: &ScalarFormat, _: &Locale) -> String {
        self.to_string()
    }

    fn parse_raw(raw: &str, _: &Locale) -> Option<Self> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}
