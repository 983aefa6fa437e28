use std::{io, path::PathBuf, str::Utf8Error};

use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const BUILTIN_RULES: &str = include_str!("../../rules/bdtopo_hydro.json");

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("Failed to read rules file: {error}")]
    FileRead { error: io::Error },

    #[error("Rules file is not valid UTF-8: {error}")]
    FileParse { error: Utf8Error },

    #[error("Failed to parse rules JSON: {error}")]
    JsonParse { error: serde_json::Error },

    #[error("Invalid pattern '{pattern}' for attribute {key}: {error}")]
    InvalidPattern {
        key: String,
        pattern: String,
        error: regex::Error,
    },

    #[error("Default action uses the matched attribute value, which defaults do not have")]
    RawValueInDefaults,
}

/// Where an action takes the tag value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum TagValueSource {
    Literal {
        value: String,
    },
    /// The matched attribute value as is.
    Raw {
        #[serde(default)]
        intern: bool,
    },
    /// The matched attribute value as a capitalized waterway name.
    Capitalized {
        #[serde(default)]
        intern: bool,
    },
    /// First whitespace separated word of the matched attribute value.
    FirstWord {
        #[serde(default)]
        intern: bool,
    },
    /// The rule table's source label.
    Source,
}

impl TagValueSource {
    fn needs_raw_value(&self) -> bool {
        match self {
            TagValueSource::Literal { .. } | TagValueSource::Source => false,
            TagValueSource::Raw { .. }
            | TagValueSource::Capitalized { .. }
            | TagValueSource::FirstWord { .. } => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum TagTest {
    Has { key: String },
    HasNot { key: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NodeAction {
    Set {
        key: String,
        value: TagValueSource,
    },
    /// Appends with a `;` separator, or sets when the key is absent.
    Append {
        key: String,
        value: TagValueSource,
    },
    If {
        test: TagTest,
        then: Box<NodeAction>,
    },
}

impl NodeAction {
    fn needs_raw_value(&self) -> bool {
        match self {
            NodeAction::Set { value, .. } | NodeAction::Append { value, .. } => {
                value.needs_raw_value()
            }
            NodeAction::If { then, .. } => then.needs_raw_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WayAction {
    Set {
        key: String,
        value: TagValueSource,
    },
    Append {
        key: String,
        value: TagValueSource,
    },
    ReverseNodes,
    If {
        test: TagTest,
        then: Box<WayAction>,
    },
    FirstNode {
        then: NodeAction,
    },
    LastNode {
        then: NodeAction,
    },
    AllNodes {
        then: NodeAction,
    },
}

impl WayAction {
    fn needs_raw_value(&self) -> bool {
        match self {
            WayAction::Set { value, .. } | WayAction::Append { value, .. } => {
                value.needs_raw_value()
            }
            WayAction::ReverseNodes => false,
            WayAction::If { then, .. } => then.needs_raw_value(),
            WayAction::FirstNode { then }
            | WayAction::LastNode { then }
            | WayAction::AllNodes { then } => then.needs_raw_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternRule {
    /// Matches the whole value literally, or as a case-insensitive regular expression
    /// anchored at the start of the value.
    pub pattern: String,
    #[serde(default)]
    pub actions: Vec<WayAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeRule {
    pub key: String,
    pub patterns: Vec<PatternRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TagRules {
    pub source: String,
    pub attributes: Vec<AttributeRule>,
    #[serde(default)]
    pub defaults: Vec<WayAction>,
}

impl TagRules {
    pub fn builtin() -> Result<Self, RulesError> {
        serde_json::from_str(BUILTIN_RULES).map_err(|error| RulesError::JsonParse { error })
    }

    #[tracing::instrument]
    pub fn read_from_file(file: PathBuf) -> Result<Self, RulesError> {
        let file = std::fs::read(file).map_err(|error| RulesError::FileRead { error })?;
        let text =
            std::str::from_utf8(&file[..]).map_err(|error| RulesError::FileParse { error })?;
        let rules: TagRules =
            serde_json::from_str(text).map_err(|error| RulesError::JsonParse { error })?;

        Ok(rules)
    }

    pub fn read(file: Option<PathBuf>) -> Result<Self, RulesError> {
        match file {
            None => Self::builtin(),
            Some(file) => Self::read_from_file(file),
        }
    }

    pub fn compile(&self) -> Result<CompiledRules, RulesError> {
        if self.defaults.iter().any(|action| action.needs_raw_value()) {
            return Err(RulesError::RawValueInDefaults);
        }
        let attributes = self
            .attributes
            .iter()
            .map(|rule| {
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|pattern| {
                        CompiledPattern::new(pattern).map_err(|error| {
                            RulesError::InvalidPattern {
                                key: rule.key.clone(),
                                pattern: pattern.pattern.clone(),
                                error,
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledAttributeRule {
                    key: rule.key.clone(),
                    patterns,
                })
            })
            .collect::<Result<Vec<_>, RulesError>>()?;

        Ok(CompiledRules {
            source: self.source.clone(),
            attributes,
            defaults: self.defaults.clone(),
        })
    }
}

#[cfg(feature = "rule-schema-writer")]
pub fn rules_json_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(TagRules);
    serde_json::to_string_pretty(&schema)
}

#[derive(Debug)]
pub struct CompiledPattern {
    literal: String,
    regex: Regex,
    pub actions: Vec<WayAction>,
}

impl CompiledPattern {
    fn new(rule: &PatternRule) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&format!("^(?:{})", rule.pattern))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            literal: rule.pattern.clone(),
            regex,
            actions: rule.actions.clone(),
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.literal == value || self.regex.is_match(value)
    }
}

#[derive(Debug)]
pub struct CompiledAttributeRule {
    pub key: String,
    pub patterns: Vec<CompiledPattern>,
}

impl CompiledAttributeRule {
    /// First pattern matching the value, in table order.
    pub fn find(&self, value: &str) -> Option<&CompiledPattern> {
        self.patterns.iter().find(|pattern| pattern.matches(value))
    }
}

#[derive(Debug)]
pub struct CompiledRules {
    pub source: String,
    pub attributes: Vec<CompiledAttributeRule>,
    pub defaults: Vec<WayAction>,
}
