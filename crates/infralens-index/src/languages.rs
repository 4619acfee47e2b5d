//! Language detection, tree-sitter grammar registry and keyword separators.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Programming language recognized by the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    /// TypeScript with JSX, parsed by its own grammar.
    Tsx,
    Go,
    Java,
    C,
    Cpp,
}

impl Lang {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Top-level AST node kinds that start a new chunk boundary.
    #[must_use]
    pub fn entity_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "impl_item",
                "type_item",
                "const_item",
                "static_item",
                "macro_definition",
                "mod_item",
            ],
            Self::Python => &[
                "function_definition",
                "class_definition",
                "decorated_definition",
            ],
            Self::JavaScript | Self::TypeScript | Self::Tsx => &[
                "function_declaration",
                "class_declaration",
                "interface_declaration",
                "type_alias_declaration",
                "enum_declaration",
                "export_statement",
                "lexical_declaration",
            ],
            Self::Go => &[
                "function_declaration",
                "method_declaration",
                "type_declaration",
                "const_declaration",
                "var_declaration",
            ],
            Self::Java | Self::C | Self::Cpp => &[],
        }
    }

    /// Node kinds that stay attached to the entity following them.
    #[must_use]
    pub fn leading_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["line_comment", "block_comment", "attribute_item"],
            Self::Python | Self::JavaScript | Self::TypeScript | Self::Tsx | Self::Go => {
                &["comment"]
            }
            Self::Java | Self::C | Self::Cpp => &[],
        }
    }

    /// Literal separators marking function/class-like units, tried when no
    /// grammar is compiled in or an entity is still too large.
    #[must_use]
    pub fn keyword_separators(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "\nfn ", "\npub fn ", "\nimpl ", "\nstruct ", "\npub struct ", "\nenum ",
                "\ntrait ", "\nmod ", "\n    fn ", "\n    pub fn ",
            ],
            Self::Python => &["\nclass ", "\ndef ", "\nasync def ", "\n    def ", "\n\tdef "],
            Self::JavaScript => &[
                "\nfunction ", "\nclass ", "\nexport ", "\nconst ", "\nlet ", "\nvar ",
            ],
            Self::TypeScript | Self::Tsx => &[
                "\nenum ", "\ninterface ", "\nnamespace ", "\ntype ", "\nclass ",
                "\nfunction ", "\nexport ", "\nconst ", "\nlet ",
            ],
            Self::Go => &["\nfunc ", "\ntype ", "\nvar ", "\nconst "],
            Self::Java => &[
                "\nclass ", "\ninterface ", "\npublic ", "\nprotected ", "\nprivate ",
                "\n    public ", "\n    protected ", "\n    private ",
            ],
            Self::C => &["\nstruct ", "\nstatic ", "\nvoid ", "\nint ", "\nchar ", "\n#define "],
            Self::Cpp => &[
                "\nnamespace ", "\nclass ", "\nstruct ", "\ntemplate", "\nstatic ", "\nvoid ",
                "\nint ",
            ],
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "rs" => Some(Lang::Rust),
        "py" | "pyi" => Some(Lang::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "mts" | "cts" => Some(Lang::TypeScript),
        "tsx" => Some(Lang::Tsx),
        "go" => Some(Lang::Go),
        "java" => Some(Lang::Java),
        "c" | "h" => Some(Lang::C),
        "cpp" | "cc" | "cxx" | "hpp" => Some(Lang::Cpp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_rs() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Some(Lang::Rust));
    }

    #[test]
    fn detect_language_js_variants() {
        for ext in &["js", "jsx", "mjs", "cjs"] {
            let path = format!("file.{ext}");
            assert_eq!(
                detect_language(Path::new(&path)),
                Some(Lang::JavaScript),
                "failed for .{ext}"
            );
        }
    }

    #[test]
    fn detect_language_ts_variants() {
        for ext in &["ts", "mts", "cts"] {
            let path = format!("web/app.{ext}");
            assert_eq!(detect_language(Path::new(&path)), Some(Lang::TypeScript));
        }
        assert_eq!(detect_language(Path::new("web/App.tsx")), Some(Lang::Tsx));
    }

    #[cfg(feature = "lang-js")]
    #[test]
    fn typescript_angle_bracket_cast_parses_cleanly() {
        let source = "const n = <number>value;\nfunction f(x: unknown) { return <string>x; }\n";
        let parse = |lang: Lang| {
            let mut parser = tree_sitter::Parser::new();
            parser.set_language(&lang.grammar().unwrap()).unwrap();
            parser.parse(source, None).unwrap()
        };
        assert!(!parse(Lang::TypeScript).root_node().has_error());
        assert!(parse(Lang::Tsx).root_node().has_error());
    }

    #[test]
    fn detect_language_c_family() {
        assert_eq!(detect_language(Path::new("main.c")), Some(Lang::C));
        assert_eq!(detect_language(Path::new("main.cpp")), Some(Lang::Cpp));
        assert_eq!(detect_language(Path::new("App.java")), Some(Lang::Java));
    }

    #[test]
    fn detect_language_non_code_returns_none() {
        assert_eq!(detect_language(Path::new("main.tf")), None);
        assert_eq!(detect_language(Path::new("ci.yml")), None);
        assert_eq!(detect_language(Path::new("README.md")), None);
        assert_eq!(detect_language(Path::new("Makefile")), None);
    }

    #[test]
    fn every_language_has_keyword_separators() {
        for lang in [
            Lang::Rust,
            Lang::Python,
            Lang::JavaScript,
            Lang::TypeScript,
            Lang::Tsx,
            Lang::Go,
            Lang::Java,
            Lang::C,
            Lang::Cpp,
        ] {
            assert!(!lang.keyword_separators().is_empty(), "{lang}");
            assert!(lang.keyword_separators().iter().all(|s| s.starts_with('\n')));
        }
    }

    #[test]
    fn entity_node_kinds_rust_includes_function_item() {
        let kinds = Lang::Rust.entity_node_kinds();
        assert!(kinds.contains(&"function_item"));
        assert!(kinds.contains(&"impl_item"));
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-js")]
        {
            assert!(Lang::JavaScript.grammar().is_some());
            assert!(Lang::TypeScript.grammar().is_some());
            assert!(Lang::Tsx.grammar().is_some());
        }
        #[cfg(feature = "lang-go")]
        assert!(Lang::Go.grammar().is_some());
        assert!(Lang::Java.grammar().is_none());
        assert!(Lang::Cpp.grammar().is_none());
    }

    #[test]
    fn lang_display_matches_id() {
        assert_eq!(Lang::Cpp.to_string(), "cpp");
        assert_eq!(Lang::TypeScript.to_string(), Lang::TypeScript.id());
    }
}
