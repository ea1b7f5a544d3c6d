use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CLDR plural categories in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

#[derive(Debug, Error)]
#[error("unknown CLDR plural category: {0}")]
pub struct UnknownCategory(pub String);

impl PluralCategory {
    pub const ALL: [PluralCategory; 6] = [
        PluralCategory::Zero,
        PluralCategory::One,
        PluralCategory::Two,
        PluralCategory::Few,
        PluralCategory::Many,
        PluralCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }

    /// Numeric id used when persisting a locale's category list.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(usize::from(idx)).copied()
    }

    pub fn parse(name: &str) -> Result<Self, UnknownCategory> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| UnknownCategory(name.to_string()))
    }
}

/// A target (or source) language with the data needed to address plural
/// forms in both CLDR and gettext terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub code: String,
    pub name: String,
    pub cldr_plurals: Vec<PluralCategory>,
    /// Gettext plural expression (the part after `plural=`).
    pub plural_rule: String,
}

impl Locale {
    /// Locale with English-like plural rules, used when a code has no
    /// built-in or configured data.
    pub fn with_default_plurals(code: &str) -> Self {
        Self {
            code: code.to_string(),
            name: code.to_string(),
            cldr_plurals: vec![PluralCategory::One, PluralCategory::Other],
            plural_rule: "(n != 1)".to_string(),
        }
    }

    pub fn nplurals(&self) -> usize {
        self.cldr_plurals.len().max(1)
    }

    /// The CLDR category addressed by a plural form index.
    pub fn category(&self, form: usize) -> Option<PluralCategory> {
        self.cldr_plurals.get(form).copied()
    }

    /// The plural form index addressing a CLDR category in this locale.
    pub fn form_of(&self, category: PluralCategory) -> Option<usize> {
        self.cldr_plurals.iter().position(|c| *c == category)
    }

    /// Value of the gettext `Plural-Forms` header.
    pub fn plural_forms_header(&self) -> String {
        format!("nplurals={}; plural={};", self.nplurals(), self.plural_rule)
    }

    /// Serialized category list (`"1,5"`) as stored in the database.
    pub fn cldr_plurals_csv(&self) -> String {
        self.cldr_plurals
            .iter()
            .map(|c| c.index().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parse_cldr_plurals_csv(csv: &str) -> Vec<PluralCategory> {
        csv.split(',')
            .filter_map(|s| s.trim().parse::<u8>().ok())
            .filter_map(PluralCategory::from_index)
            .collect()
    }
}

use PluralCategory::{Few, Many, One, Other, Two, Zero};

const ONE_OTHER: &[PluralCategory] = &[One, Other];
const RULE_NOT_ONE: &str = "(n != 1)";
const RULE_EAST_SLAVIC: &str =
    "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)";

const BUILTIN: &[(&str, &str, &[PluralCategory], &str)] = &[
    ("en-US", "English", ONE_OTHER, RULE_NOT_ONE),
    ("en-GB", "English (United Kingdom)", ONE_OTHER, RULE_NOT_ONE),
    ("en", "English", ONE_OTHER, RULE_NOT_ONE),
    ("de", "German", ONE_OTHER, RULE_NOT_ONE),
    ("de-AT", "German (Austria)", ONE_OTHER, RULE_NOT_ONE),
    ("nl", "Dutch", ONE_OTHER, RULE_NOT_ONE),
    ("sv-SE", "Swedish", ONE_OTHER, RULE_NOT_ONE),
    ("it", "Italian", ONE_OTHER, RULE_NOT_ONE),
    ("es-ES", "Spanish (Spain)", ONE_OTHER, RULE_NOT_ONE),
    ("he", "Hebrew", ONE_OTHER, RULE_NOT_ONE),
    ("fr", "French", ONE_OTHER, "(n > 1)"),
    ("pt-BR", "Portuguese (Brazil)", ONE_OTHER, "(n > 1)"),
    ("ja", "Japanese", &[Other], "0"),
    ("ko", "Korean", &[Other], "0"),
    ("zh-CN", "Chinese (Simplified)", &[Other], "0"),
    ("zh-TW", "Chinese (Traditional)", &[Other], "0"),
    ("ru", "Russian", &[One, Few, Many], RULE_EAST_SLAVIC),
    ("uk", "Ukrainian", &[One, Few, Many], RULE_EAST_SLAVIC),
    (
        "pl",
        "Polish",
        &[One, Few, Many],
        "(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)",
    ),
    ("cs", "Czech", &[One, Few, Other], "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2"),
    ("sk", "Slovak", &[One, Few, Other], "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2"),
    (
        "lt",
        "Lithuanian",
        &[One, Few, Other],
        "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && (n%100<10 || n%100>=20) ? 1 : 2)",
    ),
    (
        "sl",
        "Slovenian",
        &[One, Two, Few, Other],
        "(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3)",
    ),
    (
        "ga-IE",
        "Irish",
        &[One, Two, Few, Many, Other],
        "(n==1 ? 0 : n==2 ? 1 : n>=3 && n<=6 ? 2 : n>=7 && n<=10 ? 3 : 4)",
    ),
    (
        "ar",
        "Arabic",
        &[Zero, One, Two, Few, Many, Other],
        "(n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5)",
    ),
];

/// Look up a built-in locale by code, accepting `_` in place of `-` and any
/// letter case.
pub fn builtin_locale(code: &str) -> Option<Locale> {
    let wanted = code.replace('_', "-");
    BUILTIN
        .iter()
        .find(|(c, ..)| c.eq_ignore_ascii_case(&wanted))
        .map(|(c, name, plurals, rule)| Locale {
            code: (*c).to_string(),
            name: (*name).to_string(),
            cldr_plurals: plurals.to_vec(),
            plural_rule: (*rule).to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_accepts_underscore_variants() {
        let l = builtin_locale("de_at").unwrap();
        assert_eq!(l.code, "de-AT");
        assert_eq!(l.nplurals(), 2);
        assert!(builtin_locale("xx-YY").is_none());
    }

    #[test]
    fn plural_forms_header_and_category_mapping() {
        let sl = builtin_locale("sl").unwrap();
        assert_eq!(sl.nplurals(), 4);
        assert!(sl.plural_forms_header().starts_with("nplurals=4; plural="));
        assert_eq!(sl.form_of(PluralCategory::Few), Some(2));
        assert_eq!(sl.category(3), Some(PluralCategory::Other));

        let ja = builtin_locale("ja").unwrap();
        assert_eq!(ja.plural_forms_header(), "nplurals=1; plural=0;");
    }

    #[test]
    fn cldr_csv_round_trips() {
        let ar = builtin_locale("ar").unwrap();
        assert_eq!(ar.cldr_plurals_csv(), "0,1,2,3,4,5");
        assert_eq!(Locale::parse_cldr_plurals_csv("1, 5"), vec![One, Other]);
        assert_eq!(PluralCategory::parse("few").unwrap(), Few);
        assert!(PluralCategory::parse("several").is_err());
    }
}
