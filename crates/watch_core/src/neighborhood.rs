use std::collections::BTreeMap;

use serde::Deserialize;

use crate::ConfigError;

/// Canonical comparison key for a neighborhood name.
///
/// Lowercases, drops combining marks (Latin accents, Hebrew points), drops
/// quote-like characters (including geresh and gershayim), folds common Latin
/// accented letters and collapses every run of separators into one space.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars().flat_map(char::to_lowercase) {
        if is_mark(c) || is_quote(c) {
            continue;
        }
        let c = fold_latin(c);
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

fn is_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}'
        | '\u{0591}'..='\u{05BD}'
        | '\u{05BF}'
        | '\u{05C1}'..='\u{05C2}'
        | '\u{05C4}'..='\u{05C5}'
        | '\u{05C7}'
    )
}

fn is_quote(c: char) -> bool {
    matches!(c,
        '\'' | '"' | '`' | '\u{00B4}' | '\u{05F3}' | '\u{05F4}' | '\u{2018}'..='\u{201F}'
    )
}

fn fold_latin(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// One configured neighborhood: provider id plus the names it appears under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NeighborhoodEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Name-to-id mapping used to turn provider neighborhood text into a stable
/// identifier before any comparison happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborhoodDirectory {
    by_key: BTreeMap<String, String>,
    display: BTreeMap<String, String>,
}

impl NeighborhoodDirectory {
    pub fn new(entries: &[NeighborhoodEntry]) -> Result<Self, ConfigError> {
        let mut directory = Self::default();
        for entry in entries {
            let id = entry.id.trim().to_string();
            if directory.display.contains_key(&id) {
                return Err(ConfigError::DuplicateNeighborhoodId(id));
            }
            directory.display.insert(id.clone(), entry.name.clone());
            for name in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let key = normalize_name(name);
                if key.is_empty() {
                    continue;
                }
                match directory.by_key.get(&key) {
                    Some(existing) if existing != &id => {
                        return Err(ConfigError::AmbiguousNeighborhoodName {
                            name: name.clone(),
                            first: existing.clone(),
                            second: id,
                        });
                    }
                    _ => {
                        directory.by_key.insert(key, id.clone());
                    }
                }
            }
        }
        Ok(directory)
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.display.contains_key(id.trim())
    }

    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.display.get(id).map(String::as_str)
    }

    /// Resolves a configuration reference (an id or any known name) to an id.
    pub fn lookup(&self, reference: &str) -> Option<&str> {
        let trimmed = reference.trim();
        if let Some((id, _)) = self.display.get_key_value(trimmed) {
            return Some(id.as_str());
        }
        self.by_key.get(&normalize_name(trimmed)).map(String::as_str)
    }

    /// Normalized identifier for a provider neighborhood.
    ///
    /// A known provider id wins, then a known name; an unknown name falls back
    /// to its normalized spelling so that two listings from the same unknown
    /// neighborhood still compare equal.
    pub fn identify(&self, provider_id: Option<&str>, name: Option<&str>) -> Option<String> {
        if let Some(id) = provider_id.filter(|id| self.contains_id(id)) {
            return Some(id.trim().to_string());
        }
        if let Some(key) = name.map(normalize_name).filter(|key| !key.is_empty()) {
            return Some(self.by_key.get(&key).cloned().unwrap_or(key));
        }
        provider_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, aliases: &[&str]) -> NeighborhoodEntry {
        NeighborhoodEntry {
            id: id.into(),
            name: name.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn normalization_ignores_case_marks_and_punctuation() {
        assert_eq!(normalize_name("  Kiryat   Rishon "), "kiryat rishon");
        assert_eq!(normalize_name("Névé-Hadarim"), "neve hadarim");
        assert_eq!(normalize_name("רמב\"ם"), "רמבם");
        assert_eq!(normalize_name("רמב״ם"), "רמבם");
        assert_eq!(normalize_name("אברמוביץ'"), "אברמוביץ");
        assert_eq!(normalize_name("שָׁלוֹם"), "שלום");
        assert_eq!(normalize_name("רביבים, גני ראשון"), "רביבים גני ראשון");
    }

    #[test]
    fn directory_resolves_aliases_to_ids() {
        let directory = NeighborhoodDirectory::new(&[
            entry("295", "קרית ראשון", &["Kiryat Rishon"]),
            entry("284", "קדמת ראשון", &[]),
        ])
        .unwrap();

        assert_eq!(directory.lookup("kiryat  RISHON"), Some("295"));
        assert_eq!(directory.lookup("284"), Some("284"));
        assert_eq!(directory.lookup("nowhere"), None);
        assert_eq!(
            directory.identify(None, Some("Kiryat-Rishon")),
            Some("295".to_string())
        );
        assert_eq!(
            directory.identify(Some("284"), Some("something else")),
            Some("284".to_string())
        );
        assert_eq!(
            directory.identify(Some("999"), Some("Unknown Place")),
            Some("unknown place".to_string())
        );
        assert_eq!(directory.identify(Some("999"), None), Some("999".to_string()));
        assert_eq!(directory.identify(Some("999"), Some(" - ")), Some("999".to_string()));
        assert_eq!(directory.identify(None, Some(" - ")), None);
        assert_eq!(directory.identify(None, None), None);
    }

    #[test]
    fn directory_rejects_conflicts() {
        let err = NeighborhoodDirectory::new(&[entry("1", "A", &[]), entry("1", "B", &[])])
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateNeighborhoodId("1".into()));

        let err = NeighborhoodDirectory::new(&[entry("1", "Same", &[]), entry("2", "SAME", &[])])
            .unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousNeighborhoodName { .. }));
    }
}
