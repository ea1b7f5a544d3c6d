use std::fmt;
use std::path::Path;

/// Closed registry of supported formats. Resolved once when a resource is
/// created and persisted with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Po,
    Xliff,
    Ftl,
    Properties,
    Dtd,
    Ini,
    Lang,
    Inc,
    Json,
    Android,
}

impl Format {
    pub const ALL: [Format; 10] = [
        Format::Po,
        Format::Xliff,
        Format::Ftl,
        Format::Properties,
        Format::Dtd,
        Format::Ini,
        Format::Lang,
        Format::Inc,
        Format::Json,
        Format::Android,
    ];

    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "po" | "pot" => Some(Format::Po),
            "xliff" | "xlf" => Some(Format::Xliff),
            "ftl" => Some(Format::Ftl),
            "properties" => Some(Format::Properties),
            "dtd" => Some(Format::Dtd),
            "ini" => Some(Format::Ini),
            "lang" => Some(Format::Lang),
            "inc" => Some(Format::Inc),
            "json" => Some(Format::Json),
            "xml" => Some(Format::Android),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Po => "po",
            Format::Xliff => "xliff",
            Format::Ftl => "ftl",
            Format::Properties => "properties",
            Format::Dtd => "dtd",
            Format::Ini => "ini",
            Format::Lang => "lang",
            Format::Inc => "inc",
            Format::Json => "json",
            Format::Android => "android",
        }
    }

    pub fn parse_tag(tag: &str) -> Option<Format> {
        Self::ALL.into_iter().find(|f| f.as_str() == tag)
    }

    /// Source and target text live in the same physical file per locale.
    pub fn is_bilingual(self) -> bool {
        matches!(self, Format::Po | Format::Xliff)
    }

    /// Target files are generated from the source file's structure, so a
    /// locale is tracked for the resource whether or not its file exists yet.
    pub fn is_asymmetric(self) -> bool {
        matches!(
            self,
            Format::Ftl
                | Format::Properties
                | Format::Dtd
                | Format::Ini
                | Format::Inc
                | Format::Json
                | Format::Android
        )
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(Format::from_path(Path::new("a/b.POT")), Some(Format::Po));
        assert_eq!(Format::from_path(Path::new("res/values/strings.xml")), Some(Format::Android));
        assert_eq!(Format::from_path(Path::new("README.md")), None);
        assert_eq!(Format::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn tags_round_trip_and_classify() {
        for f in Format::ALL {
            assert_eq!(Format::parse_tag(f.as_str()), Some(f));
            assert!(!(f.is_bilingual() && f.is_asymmetric()));
        }
        assert!(Format::Po.is_bilingual());
        assert!(!Format::Lang.is_asymmetric());
    }
}
