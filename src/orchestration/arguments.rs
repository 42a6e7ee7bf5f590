use crate::orchestration::error::{ModelStage, OrchestratorError};
use crate::orchestration::prompts::{render, ARGUMENT_TEMPLATE};
use crate::orchestration::provenance::ProvenanceTable;
use crate::provider::output_parse::strip_code_fences;
use crate::provider::{extract_json_object, CompletionRequest, LanguageModel};
use serde_json::{Map, Value};

pub const OPTIONAL_ABSENT_SENTINEL: &str = "RequiredFalse";
/// Replies shorter than this (after trimming) carry no arguments.
pub const MIN_PLAUSIBLE_REPLY_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentResolution {
    Resolved(Value),
    OptionalAbsent,
    RequiredMissing,
}

impl ArgumentResolution {
    fn from_reply_value(value: Value) -> Self {
        match value {
            Value::Null => Self::RequiredMissing,
            Value::String(text) if text.is_empty() => Self::RequiredMissing,
            Value::String(text) if text == OPTIONAL_ABSENT_SENTINEL => Self::OptionalAbsent,
            other => Self::Resolved(other),
        }
    }
}

/// Argument name to resolution, in the order the model listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSet {
    entries: Vec<(String, ArgumentResolution)>,
}

impl ArgumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an argument-resolver reply. Implausibly short replies yield an empty set; replies
    /// without a JSON object are errors.
    pub fn parse_reply(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < MIN_PLAUSIBLE_REPLY_LEN {
            return Ok(Self::new());
        }
        let object = extract_json_object(strip_code_fences(trimmed))
            .ok_or_else(|| "argument reply contains no json object".to_string())?;
        let fields = serde_json::from_str::<Map<String, Value>>(object)
            .map_err(|err| format!("argument reply is not a json object: {err}"))?;

        let mut set = Self::new();
        for (name, value) in fields {
            set.insert(name, ArgumentResolution::from_reply_value(value));
        }
        Ok(set)
    }

    /// Inserts or replaces `name`, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, resolution: ArgumentResolution) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = resolution,
            None => self.entries.push((name, resolution)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgumentResolution> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, resolution)| resolution)
    }

    pub fn drop_optional_absent(&mut self) {
        self.entries
            .retain(|(_, resolution)| *resolution != ArgumentResolution::OptionalAbsent);
    }

    /// Names of required arguments whose value is unknown, in reply order.
    pub fn missing(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, resolution)| *resolution == ArgumentResolution::RequiredMissing)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Concrete values only, in reply order.
    pub fn resolved(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .filter_map(|(name, resolution)| match resolution {
                ArgumentResolution::Resolved(value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentResolution)> {
        self.entries
            .iter()
            .map(|(name, resolution)| (name.as_str(), resolution))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArguments {
    /// Post-processed: never contains optional-absent entries.
    pub arguments: ArgumentSet,
    /// Set when the reply could not be parsed and the empty set was substituted.
    pub malformed: Option<String>,
}

pub struct ArgumentResolver<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> ArgumentResolver<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    pub fn build_prompt(
        &self,
        query: &str,
        documentation: &str,
        known: &ProvenanceTable,
    ) -> Result<String, OrchestratorError> {
        let known_values = known.render_known_values();
        render(
            ARGUMENT_TEMPLATE,
            &[
                ("known_values", &known_values),
                ("documentation", documentation.trim()),
                ("query", query),
            ],
        )
    }

    pub fn resolve(
        &self,
        query: &str,
        documentation: &str,
        known: &ProvenanceTable,
    ) -> Result<ResolvedArguments, OrchestratorError> {
        let request = CompletionRequest::new(self.build_prompt(query, documentation, known)?);
        let raw = self
            .model
            .complete(&request)
            .map_err(OrchestratorError::model(ModelStage::ArgumentResolver))?;

        let (mut arguments, malformed) = match ArgumentSet::parse_reply(&raw) {
            Ok(arguments) => (arguments, None),
            Err(reason) => (ArgumentSet::new(), Some(reason)),
        };
        arguments.drop_optional_absent();
        Ok(ResolvedArguments {
            arguments,
            malformed,
        })
    }
}
