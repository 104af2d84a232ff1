//! Supported editor languages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Programming language selected for a session's shared document.
///
/// Fixed enumeration matching the editor's language picker. New sessions
/// default to [`Language::Python`]. A `language_change` message carrying
/// anything outside this set fails deserialization and is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python (session default).
    #[default]
    Python,
    /// JavaScript.
    Javascript,
    /// TypeScript.
    Typescript,
    /// Java.
    Java,
    /// C++.
    Cpp,
    /// C.
    C,
    /// Go.
    Go,
    /// Rust.
    Rust,
    /// Ruby.
    Ruby,
    /// PHP.
    Php,
}

impl Language {
    /// Returns the lowercase identifier used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Ruby => "ruby",
            Self::Php => "php",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python" => Ok(Self::Python),
            "javascript" => Ok(Self::Javascript),
            "typescript" => Ok(Self::Typescript),
            "java" => Ok(Self::Java),
            "cpp" => Ok(Self::Cpp),
            "c" => Ok(Self::C),
            "go" => Ok(Self::Go),
            "rust" => Ok(Self::Rust),
            "ruby" => Ok(Self::Ruby),
            "php" => Ok(Self::Php),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}
