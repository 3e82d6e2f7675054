//! Typed, ordered plugin options.
//!
//! Each plugin declares the options it accepts as [`OptionSpec`]s.  Caller
//! options are validated against those specs before any stream is opened:
//! an unknown name or a value of the wrong kind is a hard error.
//!
//! Resolution layers, lowest priority first:
//!
//! 1. plugin default (`OptionSpec::default`)
//! 2. configured default (`IoConfig::format_defaults`)
//! 3. sniffer recommendation
//! 4. caller value
//!
//! A caller value that disagrees with a sniffer recommendation is reported
//! back as an [`Override`] so the registry can warn about it.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IoError, Result};

// ── OptionValue ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _                   => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _                    => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _                   => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(f) => Some(*f),
            OptionValue::Int(i)   => Some(*i as f64),
            _                     => None,
        }
    }

    /// Parse command-line text as a value of `kind`.
    pub fn parse_as(kind: &OptionKind, text: &str) -> std::result::Result<Self, String> {
        match kind {
            OptionKind::Str | OptionKind::Choice(_) => Ok(OptionValue::Str(unescape(text))),
            OptionKind::Bool => match text.to_lowercase().as_str() {
                "true" | "yes" | "1"  => Ok(OptionValue::Bool(true)),
                "false" | "no" | "0"  => Ok(OptionValue::Bool(false)),
                _ => Err(format!("expected a boolean, got '{text}'")),
            },
            OptionKind::Int => text.parse().map(OptionValue::Int)
                .map_err(|_| format!("expected an integer, got '{text}'")),
            OptionKind::Float => text.parse().map(OptionValue::Float)
                .map_err(|_| format!("expected a number, got '{text}'")),
        }
    }
}

/// `\t` and `\n` escapes are accepted so delimiters can be typed on a shell.
fn unescape(text: &str) -> String {
    text.replace("\\t", "\t").replace("\\n", "\n")
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b)  => write!(f, "{b}"),
            OptionValue::Int(i)   => write!(f, "{i}"),
            OptionValue::Float(x) => write!(f, "{x}"),
            OptionValue::Str(s)   => write!(f, "{s:?}"),
        }
    }
}

impl From<&str>   for OptionValue { fn from(v: &str)   -> Self { OptionValue::Str(v.to_owned()) } }
impl From<String> for OptionValue { fn from(v: String) -> Self { OptionValue::Str(v) } }
impl From<bool>   for OptionValue { fn from(v: bool)   -> Self { OptionValue::Bool(v) } }
impl From<i64>    for OptionValue { fn from(v: i64)    -> Self { OptionValue::Int(v) } }
impl From<i32>    for OptionValue { fn from(v: i32)    -> Self { OptionValue::Int(v as i64) } }
impl From<f64>    for OptionValue { fn from(v: f64)    -> Self { OptionValue::Float(v) } }

// ── OptionSpec ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    Str,
    Bool,
    Int,
    Float,
    /// A string restricted to a fixed, lower-case set.
    Choice(&'static [&'static str]),
}

impl OptionKind {
    fn accepts(&self, value: &OptionValue) -> std::result::Result<(), String> {
        match (self, value) {
            (OptionKind::Str,   OptionValue::Str(_))   => Ok(()),
            (OptionKind::Bool,  OptionValue::Bool(_))  => Ok(()),
            (OptionKind::Int,   OptionValue::Int(_))   => Ok(()),
            (OptionKind::Float, OptionValue::Float(_)) => Ok(()),
            (OptionKind::Float, OptionValue::Int(_))   => Ok(()),
            (OptionKind::Choice(choices), OptionValue::Str(s)) => {
                if choices.iter().any(|c| c.eq_ignore_ascii_case(s)) {
                    Ok(())
                } else {
                    Err(format!("'{s}' is not one of {}", choices.join(", ")))
                }
            }
            (kind, value) => Err(format!("expected {}, got {value}", kind.describe())),
        }
    }

    /// Choice values compare in their lower-case form.
    fn canonical(&self, value: &OptionValue) -> OptionValue {
        match (self, value) {
            (OptionKind::Choice(_), OptionValue::Str(s)) => OptionValue::Str(s.to_lowercase()),
            _                                            => value.clone(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            OptionKind::Str       => "a string",
            OptionKind::Bool      => "a boolean",
            OptionKind::Int       => "an integer",
            OptionKind::Float     => "a number",
            OptionKind::Choice(_) => "one of the listed choices",
        }
    }
}

/// One option accepted by a plugin, with its default.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name:    &'static str,
    pub kind:    OptionKind,
    pub default: OptionValue,
}

impl OptionSpec {
    pub fn str(name: &'static str, default: &str) -> Self {
        Self { name, kind: OptionKind::Str, default: default.into() }
    }

    pub fn bool(name: &'static str, default: bool) -> Self {
        Self { name, kind: OptionKind::Bool, default: default.into() }
    }

    pub fn int(name: &'static str, default: i64) -> Self {
        Self { name, kind: OptionKind::Int, default: default.into() }
    }

    pub fn choice(name: &'static str, choices: &'static [&'static str], default: &str) -> Self {
        Self { name, kind: OptionKind::Choice(choices), default: default.into() }
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Insertion-ordered option map.  Serialises as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    entries: Vec<(String, OptionValue)>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Options::insert`].
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace; a replaced entry keeps its position.
    pub fn insert(&mut self, name: &str, value: impl Into<OptionValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None        => self.entries.push((name.to_owned(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OptionValue::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(OptionValue::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(OptionValue::as_int)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every entry against `specs`.
    pub fn validate(&self, format: &str, specs: &[OptionSpec]) -> Result<()> {
        for (name, value) in self.iter() {
            let spec = specs.iter().find(|s| s.name == name).ok_or_else(|| IoError::UnknownOption {
                format: format.to_owned(),
                option: name.to_owned(),
            })?;
            spec.kind.accepts(value).map_err(|msg| IoError::invalid_option(format, name, msg))?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut opts = Options::new();
        for (k, v) in iter {
            opts.insert(&k.into(), v);
        }
        opts
    }
}

impl Serialize for Options {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OptionsVisitor;

        impl<'de> Visitor<'de> for OptionsVisitor {
            type Value = Options;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of option names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Options, A::Error> {
                let mut opts = Options::new();
                while let Some((k, v)) = access.next_entry::<String, OptionValue>()? {
                    opts.insert(&k, v);
                }
                Ok(opts)
            }
        }

        deserializer.deserialize_map(OptionsVisitor)
    }
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// A caller value that replaced a different sniffer recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub option:      String,
    pub user:        OptionValue,
    pub recommended: OptionValue,
}

/// Layer defaults, configured defaults, recommendations and caller values.
///
/// Recommendations naming an option the plugin does not declare are dropped;
/// the caller's options must already be validated.
pub fn resolve(
    specs:       &[OptionSpec],
    configured:  Option<&Options>,
    recommended: Option<&Options>,
    user:        &Options,
) -> (Options, Vec<Override>) {
    let mut resolved  = Options::new();
    let mut overrides = Vec::new();

    for spec in specs {
        let canonical = |v: &OptionValue| spec.kind.canonical(v);
        let sniffed = recommended.and_then(|r| r.get(spec.name)).map(canonical);
        let value = match (user.get(spec.name).map(canonical), sniffed) {
            (Some(u), Some(r)) => {
                if u != r {
                    overrides.push(Override {
                        option:      spec.name.to_owned(),
                        user:        u.clone(),
                        recommended: r,
                    });
                }
                u
            }
            (Some(u), None) => u,
            (None, Some(r)) => r,
            (None, None) => configured
                .and_then(|c| c.get(spec.name))
                .map(canonical)
                .unwrap_or_else(|| spec.default.clone()),
        };
        resolved.insert(spec.name, value);
    }
    (resolved, overrides)
}
