/// `${...}` placeholder grammar
///
/// Accepted forms: `${name}`, `${global.name}`, `${*.name}` and `${global.*.name}`.
/// The `global` attribute makes a placeholder type-scoped (shared by every node
/// of the same component type); the `*` attribute marks its value as encrypted.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Attribute selecting type scope
pub const GLOBAL_ATTRIBUTE: &str = "global";

/// Attribute marking encrypted values
pub const ENCRYPTED_ATTRIBUTE: &str = "*";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{((\w*)(\.))?((\*)(\.))?(\w*)\}$").expect("placeholder pattern is valid")
});

/// Where a placeholder's value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderScope {
    /// One value per node instance
    Instance,
    /// One value per component type, shared by all its instances
    Type,
}

/// A parsed placeholder reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Placeholder {
    pub name: String,
    pub scope: PlaceholderScope,
    pub encrypted: bool,
}

impl Placeholder {
    /// Parse a complete `${...}` token; `None` when the text is not a placeholder
    pub fn parse(text: &str) -> Option<Self> {
        let captures = PLACEHOLDER_RE.captures(text.trim())?;
        let attribute = captures.get(2).map(|m| m.as_str());
        let marker = captures.get(5).map(|m| m.as_str());
        let name = captures.get(7).map(|m| m.as_str()).unwrap_or_default();

        let scope = if attribute == Some(GLOBAL_ATTRIBUTE) {
            PlaceholderScope::Type
        } else {
            PlaceholderScope::Instance
        };
        let encrypted = attribute == Some(ENCRYPTED_ATTRIBUTE) || marker == Some(ENCRYPTED_ATTRIBUTE);

        Some(Self {
            name: name.to_string(),
            scope,
            encrypted,
        })
    }

    pub fn is_placeholder(text: &str) -> bool {
        PLACEHOLDER_RE.is_match(text.trim())
    }

    pub fn is_global(&self) -> bool {
        self.scope == PlaceholderScope::Type
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.scope {
            PlaceholderScope::Type => "global.",
            PlaceholderScope::Instance => "",
        };
        let marker = if self.encrypted { "*." } else { "" };
        write!(f, "${{{scope}{marker}{}}}", self.name)
    }
}
