/*!
 * Spoken-form expansion of numbers and abbreviations.
 *
 * Synthesizers read digits inconsistently ("1.000" is a thousand in Spanish
 * and one in English), so the `spoken` number format spells integers out in
 * the script locale before synthesis. Values above 999 999 999 and locales
 * without a word table keep their digits.
 */

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::language_utils::SpeechLocale;

/// Largest value spelled out in words
pub const MAX_SPOKEN_NUMBER: u64 = 999_999_999;

/// Grouped integers (`1,000` / `1.000`), decimals (`3.5` / `3,5`) or plain integers
static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:[.,]\d{3})+\b|\b\d+[.,]\d+\b|\b\d+\b").unwrap()
});

static ENGLISH_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Dr.", "Doctor"),
    ("Mr.", "Mister"),
    ("Mrs.", "Missus"),
    ("vs.", "versus"),
    ("etc.", "et cetera"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("%", " percent"),
];

static SPANISH_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Sr.", "Señor"),
    ("Sra.", "Señora"),
    ("Srta.", "Señorita"),
    ("Dr.", "Doctor"),
    ("Dra.", "Doctora"),
    ("Ud.", "usted"),
    ("Uds.", "ustedes"),
    ("etc.", "etcétera"),
    ("pág.", "página"),
    ("núm.", "número"),
    ("%", " por ciento"),
];

/// Abbreviation patterns per locale, longest first so `Sra.` wins over `Sr.`
static ABBREVIATION_PATTERNS: Lazy<Vec<(SpeechLocale, Regex, &'static str)>> = Lazy::new(|| {
    let mut patterns = Vec::new();
    for (locale, table) in [
        (SpeechLocale::English, ENGLISH_ABBREVIATIONS),
        (SpeechLocale::Spanish, SPANISH_ABBREVIATIONS),
    ] {
        let mut sorted: Vec<_> = table.iter().collect();
        sorted.sort_by_key(|(abbr, _)| std::cmp::Reverse(abbr.chars().count()));
        for (abbr, expansion) in sorted {
            let escaped = regex::escape(abbr);
            // Symbols attach to the preceding number; words need a boundary
            let pattern = if abbr.chars().next().is_some_and(char::is_alphanumeric) {
                format!(r"\b{}", escaped)
            } else {
                escaped
            };
            patterns.push((locale, Regex::new(&pattern).unwrap(), *expansion));
        }
    }
    patterns
});

/// Expand abbreviations and symbols for the locale
pub fn expand_abbreviations(text: &str, locale: SpeechLocale) -> String {
    let mut result = text.to_string();
    for (pattern_locale, regex, expansion) in ABBREVIATION_PATTERNS.iter() {
        if *pattern_locale == locale {
            result = regex.replace_all(&result, *expansion).into_owned();
        }
    }
    result
}

/// Replace every number in `text` with its spoken form
pub fn expand_numbers(text: &str, locale: SpeechLocale) -> String {
    if locale == SpeechLocale::Other {
        return text.to_string();
    }

    NUMBER_REGEX
        .replace_all(text, |caps: &Captures| {
            let matched = &caps[0];
            spell_numeric_literal(matched, locale).unwrap_or_else(|| matched.to_string())
        })
        .into_owned()
}

/// Spell a matched numeric literal, honouring the locale's separators
fn spell_numeric_literal(literal: &str, locale: SpeechLocale) -> Option<String> {
    let (thousands_sep, decimal_sep) = match locale {
        SpeechLocale::Spanish => ('.', ','),
        _ => (',', '.'),
    };

    // Exact three-digit groups are thousands separators in this locale
    let groups: Vec<&str> = literal.split(thousands_sep).collect();
    if groups.len() > 1
        && groups[1..].iter().all(|g| g.len() == 3)
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit()))
    {
        let value: u64 = groups.concat().parse().ok()?;
        return spell_integer(value, locale);
    }

    if let Some((whole, fraction)) = literal.split_once(decimal_sep) {
        if whole.chars().all(|c| c.is_ascii_digit()) && fraction.chars().all(|c| c.is_ascii_digit()) {
            let whole = spell_digits_or_integer(whole, locale)?;
            let fraction = spell_digits_or_integer(fraction, locale)?;
            let point = match locale {
                SpeechLocale::Spanish => "coma",
                _ => "point",
            };
            return Some(format!("{} {} {}", whole, point, fraction));
        }
    }

    if literal.chars().all(|c| c.is_ascii_digit()) {
        return spell_digits_or_integer(literal, locale);
    }

    None
}

/// Leading zeros are read digit by digit ("007"), anything else as a number
fn spell_digits_or_integer(digits: &str, locale: SpeechLocale) -> Option<String> {
    if digits.len() > 1 && digits.starts_with('0') {
        let words: Option<Vec<String>> = digits
            .chars()
            .map(|c| spell_integer(u64::from(c.to_digit(10)?), locale))
            .collect();
        return words.map(|w| w.join(" "));
    }
    spell_integer(digits.parse().ok()?, locale)
}

/// Spell an integer in words; `None` when out of range or unsupported
pub fn spell_integer(value: u64, locale: SpeechLocale) -> Option<String> {
    if value > MAX_SPOKEN_NUMBER {
        return None;
    }
    match locale {
        SpeechLocale::English => Some(english::spell(value)),
        SpeechLocale::Spanish => Some(spanish::spell(value)),
        SpeechLocale::Other => None,
    }
}

mod english {
    const ONES: [&str; 20] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
        "nineteen",
    ];
    const TENS: [&str; 10] = [
        "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    ];

    pub fn spell(value: u64) -> String {
        if value == 0 {
            return ONES[0].to_string();
        }
        let mut parts = Vec::new();
        let millions = value / 1_000_000;
        let thousands = (value / 1_000) % 1_000;
        let rest = value % 1_000;
        if millions > 0 {
            parts.push(format!("{} million", below_thousand(millions)));
        }
        if thousands > 0 {
            parts.push(format!("{} thousand", below_thousand(thousands)));
        }
        if rest > 0 {
            parts.push(below_thousand(rest));
        }
        parts.join(" ")
    }

    fn below_thousand(value: u64) -> String {
        let hundreds = value / 100;
        let rest = value % 100;
        let mut parts = Vec::new();
        if hundreds > 0 {
            parts.push(format!("{} hundred", ONES[hundreds as usize]));
        }
        if rest > 0 {
            if rest < 20 {
                parts.push(ONES[rest as usize].to_string());
            } else if rest % 10 == 0 {
                parts.push(TENS[(rest / 10) as usize].to_string());
            } else {
                parts.push(format!("{} {}", TENS[(rest / 10) as usize], ONES[(rest % 10) as usize]));
            }
        }
        parts.join(" ")
    }
}

mod spanish {
    const UNITS: [&str; 30] = [
        "cero", "uno", "dos", "tres", "cuatro", "cinco", "seis", "siete", "ocho", "nueve", "diez",
        "once", "doce", "trece", "catorce", "quince", "dieciséis", "diecisiete", "dieciocho",
        "diecinueve", "veinte", "veintiuno", "veintidós", "veintitrés", "veinticuatro",
        "veinticinco", "veintiséis", "veintisiete", "veintiocho", "veintinueve",
    ];
    const TENS: [&str; 10] = [
        "", "", "", "treinta", "cuarenta", "cincuenta", "sesenta", "setenta", "ochenta", "noventa",
    ];
    const HUNDREDS: [&str; 10] = [
        "", "ciento", "doscientos", "trescientos", "cuatrocientos", "quinientos", "seiscientos",
        "setecientos", "ochocientos", "novecientos",
    ];

    pub fn spell(value: u64) -> String {
        if value == 0 {
            return UNITS[0].to_string();
        }
        let mut parts = Vec::new();
        let millions = value / 1_000_000;
        let thousands = (value / 1_000) % 1_000;
        let rest = value % 1_000;
        if millions == 1 {
            parts.push("un millón".to_string());
        } else if millions > 1 {
            parts.push(format!("{} millones", apocope(&below_thousand(millions))));
        }
        if thousands == 1 {
            parts.push("mil".to_string());
        } else if thousands > 1 {
            parts.push(format!("{} mil", apocope(&below_thousand(thousands))));
        }
        if rest > 0 {
            parts.push(below_thousand(rest));
        }
        parts.join(" ")
    }

    fn below_thousand(value: u64) -> String {
        if value == 100 {
            return "cien".to_string();
        }
        let hundreds = value / 100;
        let rest = value % 100;
        let mut parts = Vec::new();
        if hundreds > 0 {
            parts.push(HUNDREDS[hundreds as usize].to_string());
        }
        if rest > 0 {
            if rest < 30 {
                parts.push(UNITS[rest as usize].to_string());
            } else if rest % 10 == 0 {
                parts.push(TENS[(rest / 10) as usize].to_string());
            } else {
                parts.push(format!("{} y {}", TENS[(rest / 10) as usize], UNITS[(rest % 10) as usize]));
            }
        }
        parts.join(" ")
    }

    /// "uno" shortens before "mil"/"millones": veintiún mil, treinta y un mil
    fn apocope(words: &str) -> String {
        if let Some(stem) = words.strip_suffix("veintiuno") {
            format!("{}veintiún", stem)
        } else if let Some(stem) = words.strip_suffix("uno") {
            format!("{}un", stem)
        } else {
            words.to_string()
        }
    }
}
