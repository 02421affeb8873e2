//! Language detection collaborator.
//!
//! The output schema wants ISO 639-1 codes; `whatlang` reports ISO 639-3,
//! so [`WhatlangDetector`] maps the languages it can name to two letters.

use whatlang::Lang;

pub trait LanguageDetector {
    /// Two-letter code for `text`, or `None` if it cannot be determined.
    fn detect(&self, text: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        iso_639_1(info.lang()).map(str::to_string)
    }
}

/// Detect with `detector`, falling back to `default` when nothing usable
/// comes back.
pub fn detect_or<D: LanguageDetector>(detector: &D, text: &str, default: &str) -> String {
    detector
        .detect(text)
        .filter(|code| code.len() == 2)
        .unwrap_or_else(|| default.to_string())
}

fn iso_639_1(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Est => "et",
        Lang::Eng => "en",
        Lang::Rus => "ru",
        Lang::Fin => "fi",
        Lang::Lav => "lv",
        Lang::Lit => "lt",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Swe => "sv",
        Lang::Nob => "nb",
        Lang::Dan => "da",
        Lang::Nld => "nl",
        Lang::Pol => "pl",
        Lang::Ukr => "uk",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Ces => "cs",
        Lang::Slk => "sk",
        Lang::Slv => "sl",
        Lang::Hun => "hu",
        Lang::Ron => "ro",
        Lang::Bul => "bg",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Ell => "el",
        Lang::Tur => "tr",
        Lang::Bel => "be",
        Lang::Lat => "la",
        Lang::Cat => "ca",
        Lang::Epo => "eo",
        _ => return None,
    };
    Some(code)
}
