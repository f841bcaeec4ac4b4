/// Core domain types: documents, positions, recognized declarations, and lookup targets.
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Error;

/// Zero-based cursor position. `character` counts `char`s, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Zero-based column in `char`s.
    pub character: usize,
    /// Zero-based line index.
    pub line: usize,
}

impl Position {
    /// Build a position from zero-based line and character.
    pub const fn new(line: usize, character: usize) -> Self {
        return Self { character, line };
    }
}

/// Line-indexed view of a configuration file.
#[derive(Debug, Clone)]
pub struct Document {
    /// Lines without their terminators.
    lines: Vec<String>,
}

impl Document {
    /// Split text into lines. A trailing newline does not add an empty line.
    pub fn from_text(text: &str) -> Self {
        return Self {
            lines: text.lines().map(String::from).collect(),
        };
    }

    /// Read a document from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the file does not exist,
    /// or `Error::Io` for other read failures.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let text = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(t) => t,
        };
        return Ok(Self::from_text(&text));
    }

    /// Text of line `index`, or `None` past the end.
    pub fn line(&self, index: usize) -> Option<&str> {
        return self.lines.get(index).map(String::as_str);
    }

    /// Total number of lines.
    pub fn line_count(&self) -> usize {
        return self.lines.len();
    }
}

/// Which kind of provider block a declaration opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `data "type" "name"`
    DataSource,
    /// `resource "type" "name"`
    Resource,
}

impl BlockKind {
    /// Documentation category segment used in registry URLs.
    pub const fn docs_category(self) -> &'static str {
        return match self {
            BlockKind::DataSource => "data-sources",
            BlockKind::Resource => "resources",
        };
    }
}

/// A `resource` or `data` declaration recognized on a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// Resource or data source.
    pub kind: BlockKind,
    /// Declared instance name (second label).
    pub local_name: String,
    /// Provider short name, e.g. `aws` in `aws_instance`.
    pub provider_prefix: String,
    /// Remainder of the type name, e.g. `instance` in `aws_instance`.
    pub type_suffix: String,
}

/// A `module` block with its raw `source` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    /// Declared module name.
    pub local_name: String,
    /// Raw `source` value: local path, registry path, or private registry path.
    pub source: String,
}

/// Declaration recognized from the leading keyword of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `module "name"`. The source lives in the block body.
    Module {
        /// Declared module name.
        local_name: String,
    },
    /// `resource` or `data` block.
    Resource(ResourceReference),
}

impl Declaration {
    /// Configuration address, e.g. `aws_instance.web`, `data.aws_ami.ubuntu`, `module.vpc`.
    pub fn address(&self) -> String {
        return match self {
            Declaration::Module { local_name } => format!("module.{local_name}"),
            Declaration::Resource(r) => {
                let prefix = if r.kind == BlockKind::DataSource { "data." } else { "" };
                format!("{prefix}{}_{}.{}", r.provider_prefix, r.type_suffix, r.local_name)
            },
        };
    }
}

/// The nearest declaration whose block is still open at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingBlock {
    /// The declaration itself.
    pub declaration: Declaration,
    /// Zero-based line the declaration starts on.
    pub declaration_line: usize,
}

/// An attribute assignment inside a resource block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableContext {
    /// Attribute name left of `=`.
    pub name: String,
    /// Number of nested blocks between the resource body and the attribute.
    pub nesting_level: usize,
}

impl VariableContext {
    /// Fragment appended to documentation URLs: `name` at the top level,
    /// `name-N` when nested `N` blocks deep.
    pub fn hash_fragment(&self) -> String {
        if self.nesting_level == 0 {
            return self.name.clone();
        }
        return format!("{}-{}", self.name, self.nesting_level);
    }
}

/// Where a lookup sends the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocTarget {
    /// Open a local file.
    Navigate {
        /// File or directory to open.
        path: PathBuf,
    },
    /// Open an external documentation page.
    Url {
        /// Absolute HTTP(S) URL.
        url: String,
    },
}

impl std::fmt::Display for DocTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return match self {
            DocTarget::Navigate { path } => write!(f, "{}", path.display()),
            DocTarget::Url { url } => write!(f, "{url}"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_fragment_top_level_is_bare_name() {
        let var = VariableContext { name: "ami".to_string(), nesting_level: 0 };
        assert_eq!(var.hash_fragment(), "ami");
    }

    #[test]
    fn hash_fragment_nested_appends_level() {
        let var = VariableContext { name: "volume_size".to_string(), nesting_level: 2 };
        assert_eq!(var.hash_fragment(), "volume_size-2");
    }

    #[test]
    fn doc_target_serializes_with_kind_tag() {
        let url = DocTarget::Url { url: "https://example.com".to_string() };
        let json = serde_json::to_value(&url).unwrap();
        assert_eq!(json["kind"], "url");
        assert_eq!(json["url"], "https://example.com");

        let nav = DocTarget::Navigate { path: PathBuf::from("modules/net/main.tf") };
        let json = serde_json::to_value(&nav).unwrap();
        assert_eq!(json["kind"], "navigate");
        assert_eq!(json["path"], "modules/net/main.tf");
    }

    #[test]
    fn document_trailing_newline_adds_no_line() {
        let doc = Document::from_text("a\nb\n");
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line(1), Some("b"));
        assert_eq!(doc.line(2), None);
    }
}
