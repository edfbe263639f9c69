//! Option value interpolation.
//!
//! Two syntaxes are supported:
//!
//! - **Basic**: `%(name)s` refers to an option of the same section, the
//!   `[DEFAULT]` section, or a caller supplied variable; `%%` is a literal `%`.
//! - **Extended**: `${name}` refers to the same section and
//!   `${section:name}` to any other; `$$` is a literal `$`.
//!
//! References are resolved recursively up to [`MAX_INTERPOLATION_DEPTH`].

use std::collections::BTreeMap;

use crate::error::{ConfigError, ConfigResult};
use crate::parser::Ini;

/// Deepest chain of nested references that will be followed.
pub const MAX_INTERPOLATION_DEPTH: usize = 10;

/// Caller supplied variables consulted before section options.
pub type Vars = BTreeMap<String, String>;

/// Interpolation syntax applied to option values on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Values are returned exactly as written.
    None,
    /// `%(name)s` references.
    #[default]
    Basic,
    /// `${name}` and `${section:name}` references.
    Extended,
}

/// Resolves references against a parsed document.
pub(crate) struct Resolver<'a> {
    ini: &'a Ini,
    vars: Option<&'a Vars>,
    mode: Interpolation,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(ini: &'a Ini, vars: Option<&'a Vars>, mode: Interpolation) -> Self {
        Self { ini, vars, mode }
    }

    /// Look up and interpolate `option` in `section`.
    pub(crate) fn get(&self, section: &str, option: &str) -> ConfigResult<Option<String>> {
        match self.lookup(section, option, true) {
            Some(raw) => self.interpolate(section, option, raw, 1).map(Some),
            None => Ok(None),
        }
    }

    /// Vars first, then the section, then `[DEFAULT]`.
    fn lookup(&self, section: &str, option: &str, with_vars: bool) -> Option<&'a str> {
        if with_vars {
            if let Some(value) = self.vars.and_then(|v| v.get(option)) {
                return Some(value.as_str());
            }
        }
        self.ini.raw_option(section, option)
    }

    fn interpolate(
        &self,
        section: &str,
        option: &str,
        raw: &str,
        depth: usize,
    ) -> ConfigResult<String> {
        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(ConfigError::InterpolationDepth {
                section: section.to_string(),
                option: option.to_string(),
                depth: MAX_INTERPOLATION_DEPTH,
            });
        }
        match self.mode {
            Interpolation::None => Ok(raw.to_string()),
            Interpolation::Basic => self.basic(section, option, raw, depth),
            Interpolation::Extended => self.extended(section, option, raw, depth),
        }
    }

    fn basic(&self, section: &str, option: &str, raw: &str, depth: usize) -> ConfigResult<String> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            if let Some(tail) = rest.strip_prefix("%%") {
                out.push('%');
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("%(") {
                let end = tail
                    .find(")s")
                    .ok_or_else(|| bad(section, option, format!("bad reference: {rest}")))?;
                let name = tail[..end].to_lowercase();
                let value = self
                    .lookup(section, &name, true)
                    .ok_or_else(|| bad(section, option, format!("no option '{name}'")))?;
                out.push_str(&self.interpolate(section, &name, value, depth + 1)?);
                rest = &tail[end + 2..];
            } else {
                return Err(bad(
                    section,
                    option,
                    format!("'%' must be followed by '%' or '(': {rest}"),
                ));
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn extended(
        &self,
        section: &str,
        option: &str,
        raw: &str,
        depth: usize,
    ) -> ConfigResult<String> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            if let Some(tail) = rest.strip_prefix("$$") {
                out.push('$');
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("${") {
                let end = tail
                    .find('}')
                    .ok_or_else(|| bad(section, option, format!("bad reference: {rest}")))?;
                let path = &tail[..end];
                let (ref_section, name) = match path.split_once(':') {
                    Some((sec, name)) => (sec, name.to_lowercase()),
                    None => (section, path.to_lowercase()),
                };
                let local = ref_section == section;
                let value = self
                    .lookup(ref_section, &name, local)
                    .ok_or_else(|| bad(section, option, format!("no option '{path}'")))?;
                out.push_str(&self.interpolate(ref_section, &name, value, depth + 1)?);
                rest = &tail[end + 1..];
            } else {
                return Err(bad(
                    section,
                    option,
                    format!("'$' must be followed by '$' or '{{': {rest}"),
                ));
            }
        }

        out.push_str(rest);
        Ok(out)
    }
}

fn bad(section: &str, option: &str, reason: String) -> ConfigError {
    ConfigError::Interpolation {
        section: section.to_string(),
        option: option.to_string(),
        reason,
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(text: &str, mode: Interpolation, section: &str, option: &str) -> ConfigResult<Option<String>> {
        let ini = Ini::parse(text).unwrap();
        Resolver::new(&ini, None, mode).get(section, option)
    }

    #[test]
    fn basic_resolves_same_section_and_defaults() {
        let text = "[DEFAULT]\nroot = /data\n[a]\nsub = cache\npath = %(root)s/%(sub)s\n";
        let got = resolve(text, Interpolation::Basic, "a", "path").unwrap();
        assert_eq!(got.as_deref(), Some("/data/cache"));
    }

    #[test]
    fn basic_escapes_percent() {
        let got = resolve("[a]\nx = 100%%\n", Interpolation::Basic, "a", "x").unwrap();
        assert_eq!(got.as_deref(), Some("100%"));
    }

    #[test]
    fn basic_vars_take_precedence() {
        let ini = Ini::parse("[a]\nname = file\npath = %(name)s.txt\n").unwrap();
        let vars = Vars::from([("name".to_string(), "other".to_string())]);
        let got = Resolver::new(&ini, Some(&vars), Interpolation::Basic)
            .get("a", "path")
            .unwrap();
        assert_eq!(got.as_deref(), Some("other.txt"));
    }

    #[test]
    fn basic_missing_reference_is_an_error() {
        let err = resolve("[a]\nx = %(nope)s\n", Interpolation::Basic, "a", "x").unwrap_err();
        assert!(matches!(err, ConfigError::Interpolation { .. }));
    }

    #[test]
    fn basic_lone_percent_is_an_error() {
        assert!(resolve("[a]\nx = 5% off\n", Interpolation::Basic, "a", "x").is_err());
    }

    #[test]
    fn extended_resolves_cross_section() {
        let text = "[paths]\nroot = /srv\n[app]\nname = demo\ndir = ${paths:root}/${name}\n";
        let got = resolve(text, Interpolation::Extended, "app", "dir").unwrap();
        assert_eq!(got.as_deref(), Some("/srv/demo"));
    }

    #[test]
    fn extended_follows_nested_references() {
        let text = "[a]\nx = ${b:y}\n[b]\ny = ${z}!\nz = deep\n";
        let got = resolve(text, Interpolation::Extended, "a", "x").unwrap();
        assert_eq!(got.as_deref(), Some("deep!"));
    }

    #[test]
    fn extended_leaves_percent_alone() {
        let got = resolve("[a]\nx = 5% $$5\n", Interpolation::Extended, "a", "x").unwrap();
        assert_eq!(got.as_deref(), Some("5% $5"));
    }

    #[test]
    fn cycles_hit_the_depth_limit() {
        let text = "[a]\nx = %(y)s\ny = %(x)s\n";
        let err = resolve(text, Interpolation::Basic, "a", "x").unwrap_err();
        assert!(matches!(err, ConfigError::InterpolationDepth { .. }));
    }

    #[test]
    fn none_mode_returns_raw() {
        let got = resolve("[a]\nx = %(y)s\n", Interpolation::None, "a", "x").unwrap();
        assert_eq!(got.as_deref(), Some("%(y)s"));
    }

    #[test]
    fn missing_option_is_none() {
        assert_eq!(resolve("[a]\n", Interpolation::Basic, "a", "x").unwrap(), None);
    }
}
