use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::models::TransactionRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Contains,
    StartsWith,
    Exact,
    Regex,
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(MatchType::Contains),
            "starts_with" => Ok(MatchType::StartsWith),
            "exact" => Ok(MatchType::Exact),
            "regex" => Ok(MatchType::Regex),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchType::Contains => "contains",
            MatchType::StartsWith => "starts_with",
            MatchType::Exact => "exact",
            MatchType::Regex => "regex",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    #[serde(default)]
    pub match_type: MatchType,
    pub category: String,
    /// Only apply to records from this source account.
    #[serde(default)]
    pub source_account: Option<String>,
}

#[cfg(test)]
impl CategoryRule {
    pub fn new(pattern: &str, match_type: MatchType, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            match_type,
            category: category.to_string(),
            source_account: None,
        }
    }
}

struct CompiledRule {
    rule: CategoryRule,
    regex: Option<Regex>,
}

impl CompiledRule {
    fn matches(&self, description: &str, source_account: &str) -> bool {
        if let Some(account) = &self.rule.source_account {
            if !account.eq_ignore_ascii_case(source_account) {
                return false;
            }
        }
        let desc_upper = description.to_uppercase();
        let pat_upper = self.rule.pattern.to_uppercase();
        match self.rule.match_type {
            MatchType::Contains => desc_upper.contains(&pat_upper),
            MatchType::StartsWith => desc_upper.starts_with(&pat_upper),
            MatchType::Exact => desc_upper == pat_upper,
            MatchType::Regex => self.regex.as_ref().is_some_and(|re| re.is_match(description)),
        }
    }
}

/// Ordered category rules. The first rule that matches wins, so list the
/// most specific rules first and any catch-all last.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = match rule.match_type {
                    MatchType::Regex => Some(
                        RegexBuilder::new(&rule.pattern)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| SyncError::Rules {
                                pattern: rule.pattern.clone(),
                                reason: e.to_string(),
                            })?,
                    ),
                    _ => None,
                };
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &CategoryRule> {
        self.rules.iter().map(|cr| &cr.rule)
    }

    pub fn find_match(&self, description: &str, source_account: &str) -> Option<&CategoryRule> {
        self.rules
            .iter()
            .find(|cr| cr.matches(description, source_account))
            .map(|cr| &cr.rule)
    }

    /// Fill in `category` from the first matching rule. Records that already
    /// carry a category, or that match nothing, come back unchanged.
    pub fn resolve(&self, record: TransactionRecord) -> TransactionRecord {
        if record.category.is_some() {
            return record;
        }
        let category = self
            .find_match(&record.description, &record.source_account)
            .map(|rule| rule.category.clone());
        match category {
            Some(category) => record.with_category(category),
            None => record,
        }
    }
}
