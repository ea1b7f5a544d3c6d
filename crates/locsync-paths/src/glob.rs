//! Path patterns of `l10n.toml`: `*`, `**`, `?` and the `{locale}` /
//! `{android_locale}` placeholders.

use regex::Regex;

use crate::PathError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocaleStyle {
    Plain,
    Android,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Lit(String),
    /// `*` within one path segment.
    Star,
    /// `**/`, any number of whole directories.
    Dirs,
    /// Trailing `**`.
    Rest,
    Any,
    Locale(LocaleStyle),
}

impl Token {
    fn is_wildcard(&self) -> bool {
        matches!(self, Token::Star | Token::Dirs | Token::Rest | Token::Any)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Glob {
    pattern: String,
    tokens: Vec<Token>,
    regex: Regex,
}

/// Values captured from a matching path.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Captures {
    pub wildcards: Vec<String>,
    pub locale: Option<String>,
}

impl Glob {
    pub fn parse(pattern: &str) -> Result<Self, PathError> {
        let tokens = tokenize(pattern);
        let mut re = String::from("^");
        for t in &tokens {
            match t {
                Token::Lit(s) => re.push_str(&regex::escape(s)),
                Token::Star => re.push_str("([^/]*)"),
                Token::Dirs => re.push_str("((?:[^/]+/)*)"),
                Token::Rest => re.push_str("(.*)"),
                Token::Any => re.push_str("([^/])"),
                Token::Locale(_) => re.push_str("([^/]+)"),
            }
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| PathError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            tokens,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn wildcards(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_wildcard()).count()
    }

    pub fn has_locale(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, Token::Locale(_)))
    }

    pub fn captures(&self, rel: &str) -> Option<Captures> {
        let caps = self.regex.captures(rel)?;
        let mut out = Captures::default();
        let groups = self
            .tokens
            .iter()
            .filter(|t| !matches!(t, Token::Lit(_)))
            .enumerate();
        for (i, token) in groups {
            let value = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
            match token {
                Token::Locale(style) => {
                    let code = match style {
                        LocaleStyle::Plain => value.to_string(),
                        LocaleStyle::Android => from_android(value),
                    };
                    match &out.locale {
                        Some(prev) if *prev != code => return None,
                        _ => out.locale = Some(code),
                    }
                }
                _ => out.wildcards.push(value.to_string()),
            }
        }
        Some(out)
    }

    /// Substitute captured wildcards (in order) and a locale code.
    pub fn fill(&self, wildcards: &[String], locale: Option<&str>) -> Option<String> {
        let mut values = wildcards.iter();
        let mut out = String::new();
        for t in &self.tokens {
            match t {
                Token::Lit(s) => out.push_str(s),
                Token::Locale(style) => {
                    let code = locale?;
                    match style {
                        LocaleStyle::Plain => out.push_str(code),
                        LocaleStyle::Android => out.push_str(&to_android(code)),
                    }
                }
                _ => out.push_str(values.next()?),
            }
        }
        Some(out)
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lit = String::new();
    let mut rest = pattern;
    let flush = |lit: &mut String, tokens: &mut Vec<Token>| {
        if !lit.is_empty() {
            tokens.push(Token::Lit(std::mem::take(lit)));
        }
    };
    while let Some(c) = rest.chars().next() {
        let (token, len) = if rest.starts_with("**/") {
            (Some(Token::Dirs), 3)
        } else if rest.starts_with("**") {
            (Some(Token::Rest), 2)
        } else if c == '*' {
            (Some(Token::Star), 1)
        } else if c == '?' {
            (Some(Token::Any), 1)
        } else if rest.starts_with("{locale}") {
            (Some(Token::Locale(LocaleStyle::Plain)), "{locale}".len())
        } else if rest.starts_with("{android_locale}") {
            (Some(Token::Locale(LocaleStyle::Android)), "{android_locale}".len())
        } else {
            (None, c.len_utf8())
        };
        match token {
            Some(t) => {
                flush(&mut lit, &mut tokens);
                tokens.push(t);
            }
            None => lit.push(c),
        }
        rest = &rest[len..];
    }
    flush(&mut lit, &mut tokens);
    tokens
}

/// `de-AT` → `de-rAT`, `sr-Latn-RS` → `b+sr+Latn+RS`.
pub(crate) fn to_android(code: &str) -> String {
    let parts: Vec<&str> = code.split(['-', '_']).collect();
    match parts.as_slice() {
        [lang] => (*lang).to_string(),
        [lang, region] if region.len() == 2 || region.chars().all(|c| c.is_ascii_digit()) => {
            format!("{lang}-r{}", region.to_ascii_uppercase())
        }
        _ => format!("b+{}", parts.join("+")),
    }
}

pub(crate) fn from_android(dir: &str) -> String {
    if let Some(tagged) = dir.strip_prefix("b+") {
        return tagged.replace('+', "-");
    }
    match dir.split_once("-r") {
        Some((lang, region)) => format!("{lang}-{region}"),
        None => dir.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_capture_and_refill() {
        let reference = Glob::parse("en-US/**/*.ftl").unwrap();
        let l10n = Glob::parse("{locale}/**/*.ftl").unwrap();
        assert_eq!(reference.wildcards(), l10n.wildcards());

        let caps = l10n.captures("de/browser/menu/app.ftl").unwrap();
        assert_eq!(caps.locale.as_deref(), Some("de"));
        assert_eq!(caps.wildcards, vec!["browser/menu/", "app"]);
        assert_eq!(
            reference.fill(&caps.wildcards, None).as_deref(),
            Some("en-US/browser/menu/app.ftl")
        );
        assert!(l10n.captures("de/app.properties").is_none());
        assert_eq!(
            l10n.captures("fr/top.ftl").unwrap().wildcards,
            vec!["", "top"]
        );
    }

    #[test]
    fn android_locale_codes() {
        let g = Glob::parse("res/values-{android_locale}/strings.xml").unwrap();
        let caps = g.captures("res/values-pt-rBR/strings.xml").unwrap();
        assert_eq!(caps.locale.as_deref(), Some("pt-BR"));
        assert_eq!(
            g.fill(&[], Some("de-AT")).as_deref(),
            Some("res/values-de-rAT/strings.xml")
        );
        assert_eq!(to_android("sr-Latn-RS"), "b+sr+Latn+RS");
        assert_eq!(from_android("b+sr+Latn"), "sr-Latn");
        assert_eq!(to_android("fr"), "fr");
    }
}
