use ledgerdrop_core::OTHER_CATEGORY;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRule {
    pub label: String,
    pub pattern: String,
    #[serde(default)]
    pub match_type: MatchType,
}

impl CategoryRule {
    pub fn regex(label: &str, pattern: &str) -> Self {
        CategoryRule {
            label: label.to_string(),
            pattern: pattern.to_string(),
            match_type: MatchType::Regex,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Case-insensitive regex search anywhere in the description.
    #[default]
    Regex,
    /// Case-insensitive substring test.
    Contains,
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regex" => Ok(MatchType::Regex),
            "contains" => Ok(MatchType::Contains),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Rule #{index} has an empty label")]
    EmptyLabel { index: usize },
    #[error("Rule '{label}' has an invalid pattern: {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },
    #[error("Failed to parse rules TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Built-in bank-statement rules, in evaluation order.
pub const DEFAULT_RULES: &[(&str, &str)] = &[
    (
        "Income",
        r"PAYCHECK|SALARY|DEPOSIT.*EMPLOYER|DD\s*-|DIRECT\s*DEPOSIT",
    ),
    (
        "Food & Dining",
        r"STARBUCKS|SBX|CHIPOTLE|7-ELEVEN|7-11|COFFEE|RESTAURANT|SAFA|CHOWMEIN|KHANA",
    ),
    ("Entertainment", r"NETFLIX|SPOTIFY|HULU|DISNEY"),
    ("Transportation", r"UBER|LYFT|SHELL|FUEL|GAS|INDRIVE"),
    ("Groceries", r"WHOLE\s*FOODS|WFM|TRADER\s*JOE|COSTCO"),
    ("Bills", r"RENT|LANDLORD|UTILITIES|ELECTRIC|WATER"),
    ("Shopping", r"AMZN|AMAZON.*|TARGET|WALMART"),
];

pub fn default_rules() -> Vec<CategoryRule> {
    DEFAULT_RULES
        .iter()
        .map(|(label, pattern)| CategoryRule::regex(label, pattern))
        .collect()
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<CategoryRule>,
}

enum Matcher {
    Regex(Regex),
    /// Lowercased needle.
    Contains(String),
}

struct CompiledRule {
    rule: CategoryRule,
    matcher: Matcher,
}

impl CompiledRule {
    fn matches(&self, description: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(re) => re.is_match(description),
            Matcher::Contains(needle) => description.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Ordered first-match categorizer. Immutable once built.
pub struct CategoryRuleEngine {
    rules: Vec<CompiledRule>,
}

impl CategoryRuleEngine {
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, RuleError> {
        let compiled = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                if rule.label.trim().is_empty() {
                    return Err(RuleError::EmptyLabel { index });
                }
                let matcher = match rule.match_type {
                    MatchType::Regex => RegexBuilder::new(&rule.pattern)
                        .case_insensitive(true)
                        .build()
                        .map(Matcher::Regex)
                        .map_err(|source| RuleError::InvalidPattern {
                            label: rule.label.clone(),
                            source,
                        })?,
                    MatchType::Contains => Matcher::Contains(rule.pattern.to_lowercase()),
                };
                Ok(CompiledRule { rule, matcher })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules: compiled })
    }

    /// Parse `[[rules]]` tables, keeping file order as evaluation order.
    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        let file: RuleFile = toml::from_str(toml_content)?;
        Self::new(file.rules)
    }

    pub fn find_matching_rule(&self, description: &str) -> Option<&CategoryRule> {
        self.rules
            .iter()
            .find(|cr| cr.matches(description))
            .map(|cr| &cr.rule)
    }

    /// Label for `description`; blank or absent text is `Other` without
    /// consulting any rule.
    pub fn categorize(&self, description: Option<&str>) -> &str {
        match description {
            Some(text) if !text.trim().is_empty() => self
                .find_matching_rule(text)
                .map_or(OTHER_CATEGORY, |r| r.label.as_str()),
            _ => OTHER_CATEGORY,
        }
    }

    /// Every label this engine can return, in rule order, ending with `Other`.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for cr in &self.rules {
            if !labels.contains(&cr.rule.label.as_str()) {
                labels.push(&cr.rule.label);
            }
        }
        if !labels.contains(&OTHER_CATEGORY) {
            labels.push(OTHER_CATEGORY);
        }
        labels
    }

    pub fn rules(&self) -> impl Iterator<Item = &CategoryRule> {
        self.rules.iter().map(|cr| &cr.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for CategoryRuleEngine {
    fn default() -> Self {
        Self::new(default_rules()).expect("built-in category rules must compile")
    }
}

impl std::fmt::Debug for CategoryRuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules()).finish()
    }
}
