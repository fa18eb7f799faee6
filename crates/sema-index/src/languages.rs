//! Language detection and per-language chunking capabilities.
//!
//! Each supported language carries a [`NodeKinds`] record naming the
//! tree-sitter node types that bound chunks, so adding a language is a
//! data addition rather than new dispatch code.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported language with a tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Java,
    C,
    Cpp,
    CSharp,
    Go,
    Rust,
    Swift,
}

/// How to pull an entity name out of a chunk-bounding node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStrategy {
    /// Name is a direct identifier-like child of the node.
    Identifier,
    /// C-like: the identifier hides inside a nested declarator.
    Declarator,
}

/// Chunking capability table for one language.
#[derive(Debug, Clone, Copy)]
pub struct NodeKinds {
    /// Node types that become `function`/`method` chunks.
    pub functions: &'static [&'static str],
    /// Node types that become `class` chunks.
    pub classes: &'static [&'static str],
    /// Node types collected once per file as import statements.
    pub imports: &'static [&'static str],
    pub name_strategy: NameStrategy,
}

const PYTHON_KINDS: NodeKinds = NodeKinds {
    functions: &["function_definition", "async_function_definition"],
    classes: &["class_definition"],
    imports: &["import_statement", "import_from_statement"],
    name_strategy: NameStrategy::Identifier,
};

const JAVASCRIPT_KINDS: NodeKinds = NodeKinds {
    functions: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "method_definition",
    ],
    classes: &["class_declaration"],
    imports: &["import_statement"],
    name_strategy: NameStrategy::Identifier,
};

const TYPESCRIPT_KINDS: NodeKinds = NodeKinds {
    functions: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "method_definition",
    ],
    classes: &["class_declaration", "interface_declaration"],
    imports: &["import_statement"],
    name_strategy: NameStrategy::Identifier,
};

const JAVA_KINDS: NodeKinds = NodeKinds {
    functions: &["method_declaration", "constructor_declaration"],
    classes: &["class_declaration", "interface_declaration"],
    imports: &["import_declaration"],
    name_strategy: NameStrategy::Identifier,
};

const C_KINDS: NodeKinds = NodeKinds {
    functions: &["function_definition"],
    classes: &[],
    imports: &[],
    name_strategy: NameStrategy::Declarator,
};

const CPP_KINDS: NodeKinds = NodeKinds {
    functions: &["function_definition", "method_definition"],
    classes: &["class_specifier"],
    imports: &[],
    name_strategy: NameStrategy::Declarator,
};

const CSHARP_KINDS: NodeKinds = NodeKinds {
    functions: &["method_declaration", "constructor_declaration"],
    classes: &["class_declaration", "interface_declaration"],
    imports: &[],
    name_strategy: NameStrategy::Identifier,
};

const GO_KINDS: NodeKinds = NodeKinds {
    functions: &["function_declaration", "method_declaration"],
    classes: &["type_declaration"],
    imports: &["import_declaration"],
    name_strategy: NameStrategy::Identifier,
};

const RUST_KINDS: NodeKinds = NodeKinds {
    functions: &["function_item", "impl_item"],
    classes: &["struct_item", "enum_item", "trait_item"],
    imports: &["use_declaration"],
    name_strategy: NameStrategy::Identifier,
};

const SWIFT_KINDS: NodeKinds = NodeKinds {
    functions: &["function_declaration"],
    classes: &[
        "class_declaration",
        "struct_declaration",
        "protocol_declaration",
    ],
    imports: &["import_declaration"],
    name_strategy: NameStrategy::Identifier,
};

impl Lang {
    /// Identifier used in payloads and filters.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "c_sharp",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Swift => "swift",
        }
    }

    /// Chunk-boundary capability table for this language.
    #[must_use]
    pub fn node_kinds(self) -> &'static NodeKinds {
        match self {
            Self::Python => &PYTHON_KINDS,
            Self::JavaScript => &JAVASCRIPT_KINDS,
            Self::TypeScript | Self::Tsx => &TYPESCRIPT_KINDS,
            Self::Java => &JAVA_KINDS,
            Self::C => &C_KINDS,
            Self::Cpp => &CPP_KINDS,
            Self::CSharp => &CSHARP_KINDS,
            Self::Go => &GO_KINDS,
            Self::Rust => &RUST_KINDS,
            Self::Swift => &SWIFT_KINDS,
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the corresponding
    /// feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-java")]
            Self::Java => Some(tree_sitter_java::LANGUAGE.into()),
            #[cfg(feature = "lang-c")]
            Self::C => Some(tree_sitter_c::LANGUAGE.into()),
            #[cfg(feature = "lang-c")]
            Self::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            #[cfg(feature = "lang-csharp")]
            Self::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-swift")]
            Self::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect a parseable language from the file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "py" | "pyi" => Some(Lang::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "mts" | "cts" => Some(Lang::TypeScript),
        "tsx" => Some(Lang::Tsx),
        "java" => Some(Lang::Java),
        "c" | "h" => Some(Lang::C),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Lang::Cpp),
        "cs" => Some(Lang::CSharp),
        "go" => Some(Lang::Go),
        "rs" => Some(Lang::Rust),
        "swift" => Some(Lang::Swift),
        _ => None,
    }
}

/// Language label for any file, parseable or not.
///
/// Falls back to well-known labels for config and markup formats, then
/// `"text"` for everything else. Used on fallback chunks so filters by
/// language still work for unparsed files.
#[must_use]
pub fn language_label(path: &Path) -> &'static str {
    if let Some(lang) = detect_language(path) {
        return lang.id();
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return "text";
    };
    match ext.to_lowercase().as_str() {
        "php" => "php",
        "rb" => "ruby",
        "kt" => "kotlin",
        "scala" => "scala",
        "r" => "r",
        "sql" => "sql",
        "sh" | "bash" | "zsh" => "bash",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "xml" => "xml",
        "html" => "html",
        "css" | "scss" | "sass" => "css",
        "md" | "markdown" => "markdown",
        "tex" => "latex",
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_common_extensions() {
        assert_eq!(detect_language(Path::new("app.py")), Some(Lang::Python));
        assert_eq!(detect_language(Path::new("src/main.rs")), Some(Lang::Rust));
        assert_eq!(detect_language(Path::new("a/b.go")), Some(Lang::Go));
        assert_eq!(detect_language(Path::new("App.tsx")), Some(Lang::Tsx));
        assert_eq!(detect_language(Path::new("util.cc")), Some(Lang::Cpp));
        assert_eq!(detect_language(Path::new("Main.java")), Some(Lang::Java));
    }

    #[test]
    fn detect_language_case_insensitive() {
        assert_eq!(detect_language(Path::new("MAIN.PY")), Some(Lang::Python));
    }

    #[test]
    fn detect_language_unknown_returns_none() {
        assert_eq!(detect_language(Path::new("notes.txt")), None);
        assert_eq!(detect_language(Path::new("Makefile")), None);
    }

    #[test]
    fn language_label_falls_back() {
        assert_eq!(language_label(Path::new("a.py")), "python");
        assert_eq!(language_label(Path::new("config.yaml")), "yaml");
        assert_eq!(language_label(Path::new("index.html")), "html");
        assert_eq!(language_label(Path::new("notes.txt")), "text");
        assert_eq!(language_label(Path::new("LICENSE")), "text");
    }

    #[test]
    fn node_kinds_cover_all_languages() {
        let langs = [
            Lang::Python,
            Lang::JavaScript,
            Lang::TypeScript,
            Lang::Tsx,
            Lang::Java,
            Lang::C,
            Lang::Cpp,
            Lang::CSharp,
            Lang::Go,
            Lang::Rust,
            Lang::Swift,
        ];
        for lang in langs {
            assert!(
                !lang.node_kinds().functions.is_empty(),
                "{lang} has no function node kinds"
            );
            assert!(!lang.id().is_empty());
            assert_eq!(lang.to_string(), lang.id());
        }
    }

    #[test]
    fn c_has_no_class_kinds() {
        assert!(Lang::C.node_kinds().classes.is_empty());
        assert_eq!(Lang::C.node_kinds().name_strategy, NameStrategy::Declarator);
    }

    #[test]
    fn cpp_lists_method_definitions() {
        let kinds = Lang::Cpp.node_kinds();
        assert!(kinds.functions.contains(&"function_definition"));
        assert!(kinds.functions.contains(&"method_definition"));
    }

    #[test]
    fn typescript_includes_interfaces() {
        assert!(
            Lang::TypeScript
                .node_kinds()
                .classes
                .contains(&"interface_declaration")
        );
    }

    #[test]
    fn grammar_available_for_enabled_features() {
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-js")]
        {
            assert!(Lang::JavaScript.grammar().is_some());
            assert!(Lang::TypeScript.grammar().is_some());
            assert!(Lang::Tsx.grammar().is_some());
        }
    }
}
