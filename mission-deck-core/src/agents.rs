//! Agent roster and identity resolution.
//!
//! Every event that names an agent must carry a roster identity. Resolution is
//! total: an explicit identity field wins, then a roster name mentioned in the
//! message text, then the roster default.

use once_cell::sync::Lazy;
use regex::Regex;

/// Session keys look like `agent:<id>:<channel>...`.
static RE_SESSION_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bagent:([A-Za-z0-9_-]+)").unwrap());

pub const DEFAULT_AGENTS: &[&str] = &["main", "samwise", "frodo", "gandalf"];

/// The known agent identities. The first entry is the default identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    agents: Vec<String>,
}

impl Roster {
    /// Build a roster from names; blank and duplicate names are dropped.
    /// An empty list falls back to [`DEFAULT_AGENTS`].
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut agents: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if !name.is_empty() && !agents.contains(&name) {
                agents.push(name);
            }
        }
        if agents.is_empty() {
            return Self::default();
        }
        Self { agents }
    }

    /// Parse a comma-separated list such as `main,samwise,frodo`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn default_agent(&self) -> &str {
        &self.agents[0]
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.iter().any(|a| a.eq_ignore_ascii_case(id))
    }

    /// Coerce any identity to a roster member.
    pub fn coerce(&self, id: Option<&str>) -> String {
        id.map(str::trim)
            .and_then(|id| {
                let id = agent_from_session_key(id).unwrap_or(id);
                self.agents.iter().find(|a| a.eq_ignore_ascii_case(id))
            })
            .unwrap_or(&self.agents[0])
            .clone()
    }

    /// First non-default roster name mentioned as a whole word in `text`,
    /// in roster order. The default identity never needs a keyword.
    pub fn mentioned_in(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.agents
            .iter()
            .skip(1)
            .find(|name| contains_word(&lower, name))
            .map(String::as_str)
    }

    /// Resolve an identity with the fixed precedence:
    /// explicit hint > keyword in text > default.
    pub fn resolve(&self, explicit: Option<&str>, text: &str) -> String {
        if let Some(hint) = explicit.filter(|h| !h.trim().is_empty()) {
            return self.coerce(Some(hint));
        }
        self.mentioned_in(text)
            .map(str::to_string)
            .unwrap_or_else(|| self.default_agent().to_string())
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            agents: DEFAULT_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Extract the agent id from a session key like `agent:samwise:main`.
pub fn agent_from_session_key(key: &str) -> Option<&str> {
    RE_SESSION_KEY
        .captures(key)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_is_default() {
        let roster = Roster::parse(" Samwise, frodo ,,samwise");
        assert_eq!(roster.default_agent(), "samwise");
        assert_eq!(roster.agents(), &["samwise".to_string(), "frodo".to_string()]);
    }

    #[test]
    fn empty_list_falls_back_to_defaults() {
        assert_eq!(Roster::parse(" , "), Roster::default());
    }

    #[test]
    fn unknown_identity_coerces_to_default() {
        let roster = Roster::default();
        assert_eq!(roster.coerce(Some("saruman")), "main");
        assert_eq!(roster.coerce(None), "main");
        assert_eq!(roster.coerce(Some("FRODO")), "frodo");
    }

    #[test]
    fn session_keys_resolve_to_agent() {
        let roster = Roster::default();
        assert_eq!(roster.coerce(Some("agent:samwise:telegram:123")), "samwise");
        assert_eq!(agent_from_session_key("agent:frodo:main"), Some("frodo"));
        assert_eq!(agent_from_session_key("main"), None);
    }

    #[test]
    fn explicit_hint_beats_keyword() {
        let roster = Roster::default();
        assert_eq!(roster.resolve(Some("frodo"), "samwise is busy"), "frodo");
        assert_eq!(roster.resolve(None, "samwise is busy"), "samwise");
        assert_eq!(roster.resolve(Some("  "), "nobody here"), "main");
    }

    #[test]
    fn keyword_match_requires_whole_word() {
        let roster = Roster::default();
        assert_eq!(roster.mentioned_in("samwisely done"), None);
        assert_eq!(roster.mentioned_in("[samwise] tool start"), Some("samwise"));
    }
}
