//! Built-in language set and extension routing.

pub(crate) mod c;
pub(crate) mod cpp;
pub(crate) mod csharp;
pub(crate) mod go;
pub(crate) mod java;
pub(crate) mod javascript;
pub(crate) mod kotlin;
pub(crate) mod php;
pub(crate) mod profile;
pub(crate) mod python;
pub(crate) mod rust;
pub(crate) mod shell;
pub(crate) mod typescript;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Languages with built-in adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageKind {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    CSharp,
    C,
    Cpp,
    Php,
    Kotlin,
    Shell,
}

impl LanguageKind {
    pub fn as_str(&self) -> &'static str {
        use LanguageKind::*;
        match self {
            TypeScript => "typescript",
            JavaScript => "javascript",
            Python => "python",
            Rust => "rust",
            Go => "go",
            Java => "java",
            CSharp => "csharp",
            C => "c",
            Cpp => "cpp",
            Php => "php",
            Kotlin => "kotlin",
            Shell => "shell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        use LanguageKind::*;
        Some(match s {
            "typescript" => TypeScript,
            "javascript" => JavaScript,
            "python" => Python,
            "rust" => Rust,
            "go" => Go,
            "java" => Java,
            "csharp" => CSharp,
            "c" => C,
            "cpp" => Cpp,
            "php" => Php,
            "kotlin" => Kotlin,
            "shell" => Shell,
            _ => return None,
        })
    }

    /// Extensions this language claims, without dots.
    pub fn extensions(&self) -> &'static [&'static str] {
        use LanguageKind::*;
        match self {
            TypeScript => &["ts", "tsx", "mts", "cts"],
            JavaScript => &["js", "jsx", "mjs", "cjs"],
            Python => &["py", "pyi"],
            Rust => &["rs"],
            Go => &["go"],
            Java => &["java"],
            CSharp => &["cs"],
            C => &["c", "h"],
            Cpp => &["cc", "cpp", "cxx", "hpp", "hh", "hxx"],
            Php => &["php"],
            Kotlin => &["kt", "kts"],
            Shell => &["sh", "bash", "zsh"],
        }
    }

    pub fn all() -> &'static [LanguageKind] {
        use LanguageKind::*;
        &[
            TypeScript, JavaScript, Python, Rust, Go, Java, CSharp, C, Cpp, Php, Kotlin, Shell,
        ]
    }
}

impl Display for LanguageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect a language from a file extension.
pub fn detect_language(path: &Path) -> Option<LanguageKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    LanguageKind::all()
        .iter()
        .copied()
        .find(|lang| lang.extensions().contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_covers_builtin_extensions() {
        assert_eq!(
            detect_language(Path::new("src/a.ts")),
            Some(LanguageKind::TypeScript)
        );
        assert_eq!(
            detect_language(Path::new("pkg/main.go")),
            Some(LanguageKind::Go)
        );
        assert_eq!(
            detect_language(Path::new("Makefile")),
            None
        );
        assert_eq!(
            detect_language(Path::new("lib.RS")),
            Some(LanguageKind::Rust)
        );
    }
}
