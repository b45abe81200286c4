use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// Rough chars-per-token ratio used for the context window check
const CHARS_PER_TOKEN: usize = 4;

// Target languages accepted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    JavaScript,
    TypeScript,
    Python,
    Java,
    C,
    Cpp,
    CSharp,
    Go,
    Rust,
    Php,
    Ruby,
    Swift,
    Kotlin,
    Sql,
    Bash,
    /// Prompt is forwarded to upstream verbatim.
    Custom,
}

impl Language {
    pub const ALL: [Language; 16] = [
        Language::JavaScript,
        Language::TypeScript,
        Language::Python,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::CSharp,
        Language::Go,
        Language::Rust,
        Language::Php,
        Language::Ruby,
        Language::Swift,
        Language::Kotlin,
        Language::Sql,
        Language::Bash,
        Language::Custom,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Php => "PHP",
            Language::Ruby => "Ruby",
            Language::Swift => "Swift",
            Language::Kotlin => "Kotlin",
            Language::Sql => "SQL",
            Language::Bash => "Bash",
            Language::Custom => "Custom",
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Language::Custom)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.id() == s)
            .ok_or_else(|| ValidationError::UnsupportedLanguage(s.to_string()))
    }
}

// Upstream models the gateway is allowed to route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    Gpt4oMini,
    Llama31_70b,
    Mixtral8x7b,
    Gpt4o,
}

impl Model {
    pub const ALL: [Model; 4] = [
        Model::Gpt4oMini,
        Model::Llama31_70b,
        Model::Mixtral8x7b,
        Model::Gpt4o,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Llama31_70b => "llama-3.1-70b",
            Model::Mixtral8x7b => "mixtral-8x7b",
            Model::Gpt4o => "gpt-4o",
        }
    }

    pub fn max_context_tokens(&self) -> u32 {
        match self {
            Model::Gpt4oMini => 128_000,
            Model::Llama31_70b => 131_072,
            Model::Mixtral8x7b => 32_768,
            Model::Gpt4o => 128_000,
        }
    }

    pub fn relative_cost(&self) -> u32 {
        match self {
            Model::Gpt4oMini => 1,
            Model::Llama31_70b => 3,
            Model::Mixtral8x7b => 2,
            Model::Gpt4o => 15,
        }
    }

    /// The model used when a request does not name one.
    pub fn cheapest() -> Model {
        Model::ALL
            .iter()
            .copied()
            .min_by_key(Model::relative_cost)
            .unwrap_or(Model::Gpt4oMini)
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::cheapest()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Model {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Model::ALL
            .iter()
            .copied()
            .find(|model| model.id() == s)
            .ok_or_else(|| ValidationError::UnsupportedModel(s.to_string()))
    }
}

// Inbound API body, before validation
#[derive(Deserialize, Debug, Default, Clone)]
pub struct GenerateBody {
    pub prompt: Option<String>,
    pub language: Option<String>,
    pub model: Option<String>,
}

// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub language: Language,
    pub model: Model,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, language: Language, model: Model) -> Self {
        Self {
            prompt: prompt.into(),
            language,
            model,
        }
    }

    /// Validates an inbound body. No I/O happens here.
    pub fn from_body(body: GenerateBody) -> Result<Self, ValidationError> {
        let prompt = body.prompt.unwrap_or_default();
        if prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        let language = match body.language.as_deref().filter(|s| !s.is_empty()) {
            Some(lang) => lang.parse()?,
            None => Language::default(),
        };
        let model = match body.model.as_deref().filter(|s| !s.is_empty()) {
            Some(model) => model.parse()?,
            None => Model::default(),
        };

        let estimated_tokens = prompt.chars().count().div_ceil(CHARS_PER_TOKEN);
        if estimated_tokens > model.max_context_tokens() as usize {
            return Err(ValidationError::PromptTooLong {
                model: model.id(),
                estimated_tokens,
                max_tokens: model.max_context_tokens(),
            });
        }

        Ok(Self {
            prompt,
            language,
            model,
        })
    }
}

// What the upstream (or the cache) hands back
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub code: String,
    pub explanation: Option<String>,
    pub model: Model,
    pub language: Language,
    pub served_from_cache: bool,
}

// Success body returned to API callers
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GenerateResponse {
    pub status: bool,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub model: String,
    pub language: String,
    pub cached: bool,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            status: true,
            code: result.code,
            explanation: result.explanation,
            model: result.model.id().to_string(),
            language: result.language.id().to_string(),
            cached: result.served_from_cache,
        }
    }
}

// Failure body returned to API callers
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub status: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}
