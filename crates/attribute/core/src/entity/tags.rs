//! Tags and accept-filters.
//!
//! A parent entity carries a list of [`TagFilterMatch`] rules; a prospective child is
//! accepted only if every rule matches the child's tags.

use std::fmt;

/// A free-form label attached to an entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Tag(pub String);

impl Tag {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Anything that exposes tags.
pub trait Taggable {
    fn tags(&self) -> &[Tag];

    fn contains_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t.as_str() == tag)
    }
}

impl Taggable for Vec<Tag> {
    fn tags(&self) -> &[Tag] {
        self
    }
}

/// Decides whether a candidate may become a child.
pub trait TagFilter {
    fn matches(&self, candidate: &dyn Taggable) -> bool;
}

/// Whether a rule requires or forbids its tag.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TagFilterRule {
    #[default]
    Include,
    Exclude,
}

/// Requires (`Include`) or forbids (`Exclude`) one tag on the candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagFilterMatch {
    pub tag: Tag,
    pub rule: TagFilterRule,
}

impl TagFilterMatch {
    pub fn include(tag: impl Into<String>) -> Self {
        Self {
            tag: Tag::new(tag),
            rule: TagFilterRule::Include,
        }
    }

    pub fn exclude(tag: impl Into<String>) -> Self {
        Self {
            tag: Tag::new(tag),
            rule: TagFilterRule::Exclude,
        }
    }
}

impl TagFilter for TagFilterMatch {
    fn matches(&self, candidate: &dyn Taggable) -> bool {
        let present = candidate.contains_tag(self.tag.as_str());
        match self.rule {
            TagFilterRule::Include => present,
            TagFilterRule::Exclude => !present,
        }
    }
}

/// A filter list passes when every rule passes; an empty list accepts everything.
impl<F: TagFilter> TagFilter for [F] {
    fn matches(&self, candidate: &dyn Taggable) -> bool {
        self.iter().all(|filter| filter.matches(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(labels: &[&str]) -> Vec<Tag> {
        labels.iter().map(|&l| Tag::from(l)).collect()
    }

    #[test]
    fn include_and_exclude_rules() {
        let knight = tags(&["humanoid", "armored"]);
        let ghost = tags(&["undead"]);

        assert!(TagFilterMatch::include("humanoid").matches(&knight));
        assert!(!TagFilterMatch::include("humanoid").matches(&ghost));
        assert!(TagFilterMatch::exclude("undead").matches(&knight));
        assert!(!TagFilterMatch::exclude("undead").matches(&ghost));
    }

    #[test]
    fn every_rule_in_a_list_must_match() {
        let filters = [
            TagFilterMatch::include("humanoid"),
            TagFilterMatch::exclude("undead"),
        ];
        let knight = tags(&["humanoid"]);
        let lich = tags(&["humanoid", "undead"]);

        assert!(filters.matches(&knight));
        assert!(!filters.matches(&lich));

        let empty: [TagFilterMatch; 0] = [];
        assert!(empty.matches(&lich));
    }

    #[test]
    fn rules_parse_case_insensitively() {
        assert_eq!("EXCLUDE".parse::<TagFilterRule>().unwrap(), TagFilterRule::Exclude);
    }
}
