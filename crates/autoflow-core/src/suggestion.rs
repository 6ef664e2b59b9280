//! Quick-win suggestions, mutes and notification preferences

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{AutomationError, Result};
use crate::types::{RuleId, SuggestionId};

/// A lightweight automation proposal surfaced by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    #[serde(default)]
    pub rule_id: Option<RuleId>,
    pub title: String,
    pub description: String,
    /// Free-form tag, the unit of muting
    pub suggestion_type: String,
    /// Predicted weekly time savings in minutes
    #[serde(default)]
    pub predicted_savings_minutes: Option<u32>,
    #[serde(default)]
    pub requires_approval: Option<bool>,
}

impl Suggestion {
    pub fn new(
        id: SuggestionId,
        suggestion_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            rule_id: None,
            title: title.into(),
            description: description.into(),
            suggestion_type: suggestion_type.into(),
            predicted_savings_minutes: None,
            requires_approval: None,
        }
    }

    pub fn with_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    pub fn with_savings(mut self, minutes: u32) -> Self {
        self.predicted_savings_minutes = Some(minutes);
        self
    }

    pub fn requiring_approval(mut self, required: bool) -> Self {
        self.requires_approval = Some(required);
        self
    }
}

/// Standing suppression of future suggestions of a type, optionally per rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MuteRule {
    pub suggestion_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
}

impl MuteRule {
    pub fn new(suggestion_type: impl Into<String>, rule_id: Option<RuleId>) -> Result<Self> {
        let suggestion_type = suggestion_type.into();
        if suggestion_type.trim().is_empty() {
            return Err(AutomationError::validation("suggestion_type is required to mute"));
        }
        Ok(Self {
            suggestion_type,
            rule_id,
        })
    }

    /// A type-wide mute covers every rule; a scoped mute only its own rule
    pub fn covers(&self, suggestion: &Suggestion) -> bool {
        self.suggestion_type == suggestion.suggestion_type
            && match &self.rule_id {
                None => true,
                Some(rule) => suggestion.rule_id.as_ref() == Some(rule),
            }
    }
}

/// Per-rule badge in the summary widget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBadge {
    pub has_suggestions: bool,
    #[serde(default)]
    pub predicted_weekly_savings_minutes: Option<u32>,
}

/// User notification preferences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub weekly_digest_opt_in: bool,
}

/// Everything the suggestion widget shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSummary {
    #[serde(default)]
    pub badges: BTreeMap<String, SuggestionBadge>,
    #[serde(default)]
    pub quick_wins: Vec<Suggestion>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub prefs: NotificationPrefs,
}

impl SuggestionSummary {
    /// Build a summary from live suggestions, hiding everything a mute covers
    pub fn build<'a>(
        suggestions: impl IntoIterator<Item = &'a Suggestion>,
        mutes: &HashSet<MuteRule>,
        unread_count: u32,
        prefs: NotificationPrefs,
    ) -> Self {
        let quick_wins: Vec<Suggestion> = suggestions
            .into_iter()
            .filter(|s| !mutes.iter().any(|m| m.covers(s)))
            .cloned()
            .collect();

        let mut badges: BTreeMap<String, SuggestionBadge> = BTreeMap::new();
        for suggestion in &quick_wins {
            let Some(rule) = &suggestion.rule_id else {
                continue;
            };
            let badge = badges.entry(rule.to_string()).or_default();
            badge.has_suggestions = true;
            if let Some(minutes) = suggestion.predicted_savings_minutes {
                *badge.predicted_weekly_savings_minutes.get_or_insert(0) += minutes;
            }
        }

        Self {
            badges,
            unread_count: unread_count.min(quick_wins.len() as u32),
            quick_wins,
            prefs,
        }
    }

    pub fn has_type(&self, suggestion_type: &str) -> bool {
        self.quick_wins
            .iter()
            .any(|s| s.suggestion_type == suggestion_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(id: &str, kind: &str, rule: &str) -> Suggestion {
        Suggestion::new(SuggestionId::new(id), kind, "Auto-reply to FAQs", "Answer shipping questions")
            .with_rule(RuleId::new(rule))
            .with_savings(30)
    }

    #[test]
    fn test_mute_scope() {
        let faq = suggestion("1", "faq_reply", "r1");
        let other_rule = suggestion("2", "faq_reply", "r2");

        let type_wide = MuteRule::new("faq_reply", None).unwrap();
        assert!(type_wide.covers(&faq));
        assert!(type_wide.covers(&other_rule));

        let scoped = MuteRule::new("faq_reply", Some(RuleId::new("r1"))).unwrap();
        assert!(scoped.covers(&faq));
        assert!(!scoped.covers(&other_rule));

        assert!(MuteRule::new(" ", None).is_err());
    }

    #[test]
    fn test_summary_hides_muted_and_builds_badges() {
        let items = vec![
            suggestion("1", "faq_reply", "r1"),
            suggestion("2", "faq_reply", "r1"),
            suggestion("3", "spam_filter", "r2"),
        ];
        let mut mutes = HashSet::new();
        mutes.insert(MuteRule::new("spam_filter", None).unwrap());

        let summary = SuggestionSummary::build(&items, &mutes, 5, NotificationPrefs::default());
        assert_eq!(summary.quick_wins.len(), 2);
        assert!(!summary.has_type("spam_filter"));
        assert_eq!(summary.unread_count, 2);

        let badge = &summary.badges["r1"];
        assert!(badge.has_suggestions);
        assert_eq!(badge.predicted_weekly_savings_minutes, Some(60));
        assert!(!summary.badges.contains_key("r2"));
    }
}
