//! INI text parser.
//!
//! Produces an [`Ini`] document: named sections of lower-cased option keys,
//! plus the `[DEFAULT]` section whose options are visible from every other
//! section.
//!
//! ```text
//! [DEFAULT]
//! root = /var/lib/app
//!
//! [store]
//! path = %(root)s/store      ; interpolated later, stored raw here
//! banner = first line
//!     continued line
//! ```

use std::collections::BTreeMap;

use crate::error::{ConfigError, ConfigResult};

/// Name of the section that supplies fallback options to every section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Raw (uninterpolated) options of a single section.
pub type RawSection = BTreeMap<String, String>;

/// A parsed INI document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ini {
    defaults: RawSection,
    sections: BTreeMap<String, RawSection>,
}

impl Ini {
    /// Parse INI text.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut ini = Self::default();
        // (section, key) of the option that indented lines continue.
        let mut current_section: Option<String> = None;
        let mut current_key: Option<String> = None;

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                current_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = line.starts_with(char::is_whitespace);
            if indented {
                if let (Some(section), Some(key)) = (&current_section, &current_key) {
                    let value = ini
                        .section_mut(section)
                        .get_mut(key)
                        .ok_or_else(|| ConfigError::Parse {
                            line: lineno,
                            reason: "continuation without an option".to_string(),
                        })?;
                    value.push('\n');
                    value.push_str(trimmed);
                    continue;
                }
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| ConfigError::Parse {
                        line: lineno,
                        reason: format!("unterminated section header: {trimmed}"),
                    })?
                    .trim();
                if name.is_empty() {
                    return Err(ConfigError::Parse {
                        line: lineno,
                        reason: "empty section name".to_string(),
                    });
                }
                ini.section_mut(name);
                current_section = Some(name.to_string());
                current_key = None;
                continue;
            }

            let Some(section) = &current_section else {
                return Err(ConfigError::Parse {
                    line: lineno,
                    reason: format!("option outside of a section: {trimmed}"),
                });
            };

            let split = trimmed.find(['=', ':']).ok_or_else(|| ConfigError::Parse {
                line: lineno,
                reason: format!("option without a value: {trimmed}"),
            })?;
            let key = trimmed[..split].trim().to_lowercase();
            let value = trimmed[split + 1..].trim().to_string();
            if key.is_empty() {
                return Err(ConfigError::Parse {
                    line: lineno,
                    reason: "empty option name".to_string(),
                });
            }

            ini.section_mut(section).insert(key.clone(), value);
            current_key = Some(key);
        }

        Ok(ini)
    }

    /// Options of the `[DEFAULT]` section.
    pub fn defaults(&self) -> &RawSection {
        &self.defaults
    }

    /// Raw options of a named section (not including defaults).
    pub fn section(&self, name: &str) -> Option<&RawSection> {
        if name == DEFAULT_SECTION {
            Some(&self.defaults)
        } else {
            self.sections.get(name)
        }
    }

    /// Whether a section exists. `DEFAULT` is never reported as a section.
    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Names of all sections except `DEFAULT`, sorted.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Look up a raw option in `section`, falling back to `[DEFAULT]`.
    pub fn raw_option(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .or_else(|| self.defaults.get(key))
            .map(String::as_str)
    }

    /// Option keys of `section` merged with the `[DEFAULT]` keys.
    pub fn option_keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .sections
            .get(section)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        for key in self.defaults.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys.sort();
        keys
    }

    fn section_mut(&mut self, name: &str) -> &mut RawSection {
        if name == DEFAULT_SECTION {
            &mut self.defaults
        } else {
            self.sections.entry(name.to_string()).or_default()
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
