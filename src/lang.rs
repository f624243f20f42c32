// Language handling — the closed set of languages the pipeline accepts.
//
// Two naming layers: the two-letter tags used in CLI arguments, prompts,
// and logs ("en", "ru", "tt"), and the script-qualified tags the
// translation model expects ("eng_Latn", ...). Both lookups fail loudly
// on unknown input — an unmapped language is a configuration error,
// never a silent default.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

/// Languages the pipeline can detoxify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Russian,
    Tatar,
}

/// Every language the pipeline supports, in display order.
pub const SUPPORTED: [Language; 3] = [Language::English, Language::Russian, Language::Tatar];

impl Language {
    /// Two-letter tag used in CLI arguments, prompts, and logs.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Russian => "ru",
            Language::Tatar => "tt",
        }
    }

    /// English display name, used when a prompt names the language.
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Russian => "Russian",
            Language::Tatar => "Tatar",
        }
    }

    /// Script-qualified tag understood by the NLLB-class translation model.
    pub fn translation_code(self) -> &'static str {
        match self {
            Language::English => "eng_Latn",
            Language::Russian => "rus_Cyrl",
            Language::Tatar => "tat_Cyrl",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        for lang in SUPPORTED {
            if lang.code() == s {
                return Ok(lang);
            }
        }
        bail!(
            "Language '{}' is not supported. Supported languages: {}",
            s,
            supported_codes().join(", ")
        )
    }
}

/// All supported two-letter tags, for error messages and `languages` output.
pub fn supported_codes() -> Vec<&'static str> {
    SUPPORTED.iter().map(|l| l.code()).collect()
}

/// Look up the translation-model tag for a raw two-letter tag.
///
/// Callers holding unvalidated input (CLI arguments, TSV metadata) get the
/// same descriptive failure as the enum parser: the offending tag plus the
/// supported set. Validated `Language` values can use
/// [`Language::translation_code`] directly, which cannot fail.
pub fn translation_code(tag: &str) -> Result<&'static str> {
    match tag.parse::<Language>() {
        Ok(lang) => Ok(lang.translation_code()),
        Err(_) => bail!(
            "No translation code for language '{}'. Supported languages: {}",
            tag,
            supported_codes().join(", ")
        ),
    }
}
