//! Scope of languages considered when highlighting fenced code in answers.

use thiserror::Error;

/// Language names the highlighter understands (lowercase).
pub const KNOWN_LANGUAGES: &[&str] = &[
    "bash", "c", "clojure", "cpp", "csharp", "css", "dart", "diff", "dockerfile", "elixir",
    "erlang", "go", "graphql", "haskell", "html", "ini", "java", "javascript", "json", "julia",
    "kotlin", "latex", "lua", "makefile", "markdown", "nginx", "objectivec", "ocaml", "perl",
    "php", "plaintext", "powershell", "python", "r", "ruby", "rust", "scala", "scss", "shell",
    "sql", "swift", "toml", "typescript", "xml", "yaml", "zig",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeScope {
    /// Let the highlighter detect the language among everything it knows.
    Auto,
    /// Restrict detection to these languages, in configured order.
    Languages(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown highlight language(s): {}", unknown.join(", "))]
pub struct CodeScopeError {
    pub unknown: Vec<String>,
}

impl CodeScope {
    /// Parse a comma-separated list such as `"rust, python"`.
    ///
    /// Entries are trimmed and lowercased; empty entries are skipped. An
    /// empty list means [`CodeScope::Auto`].
    pub fn parse(raw: &str) -> Result<Self, CodeScopeError> {
        let mut languages = Vec::new();
        let mut unknown = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let name = entry.to_ascii_lowercase();
            if KNOWN_LANGUAGES.contains(&name.as_str()) {
                if !languages.contains(&name) {
                    languages.push(name);
                }
            } else {
                unknown.push(entry.to_string());
            }
        }

        if !unknown.is_empty() {
            return Err(CodeScopeError { unknown });
        }
        if languages.is_empty() {
            return Ok(Self::Auto);
        }
        Ok(Self::Languages(languages))
    }

    #[must_use]
    pub fn allows(&self, language: &str) -> bool {
        match self {
            Self::Auto => true,
            Self::Languages(languages) => languages.iter().any(|l| l.eq_ignore_ascii_case(language)),
        }
    }
}
