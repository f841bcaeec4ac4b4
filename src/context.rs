//! Lexical context at a cursor: which declaration, attribute, and nesting depth it sits in.
//!
//! Recognition is regex per line plus a raw `{`/`}` count across lines. Braces
//! inside string literals or comments are counted like any other brace.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{BlockKind, Declaration, Document, EnclosingBlock, Position, ResourceReference, VariableContext};

/// `resource "aws_instance" "web"` or `data "aws_ami" "ubuntu"`.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static RESOURCE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"^\s*(resource|data)\s+"([A-Za-z\-]+)_([a-z0-9_]+)"\s+"([^"]+)""#).expect("valid regex");
});

/// `module "network"`.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static MODULE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"^\s*module\s+"([^"]+)""#).expect("valid regex");
});

/// `  name = value`.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^\s*([a-z0-9_]+)\s*=\s*(.*)$").expect("valid regex");
});

/// Recognize a `resource`, `data`, or `module` declaration on one line.
pub fn match_declaration(line: &str) -> Option<Declaration> {
    if let Some(caps) = RESOURCE_DECLARATION.captures(line) {
        let kind = if caps.get(1)?.as_str() == "data" { BlockKind::DataSource } else { BlockKind::Resource };
        return Some(Declaration::Resource(ResourceReference {
            kind,
            local_name: caps.get(4)?.as_str().to_string(),
            provider_prefix: caps.get(2)?.as_str().to_string(),
            type_suffix: caps.get(3)?.as_str().to_string(),
        }));
    }

    let caps = MODULE_DECLARATION.captures(line)?;
    return Some(Declaration::Module {
        local_name: caps.get(1)?.as_str().to_string(),
    });
}

/// Find the nearest declaration at or above `position` whose block is still open there.
///
/// A candidate whose braces balance back to zero before the position is
/// skipped and the search continues further up.
pub fn find_enclosing_block(document: &Document, position: Position) -> Option<EnclosingBlock> {
    for line in (0..=position.line).rev() {
        let Some(declaration) = document.line(line).and_then(match_declaration) else {
            continue;
        };
        if block_open_at(document, line, position) {
            return Some(EnclosingBlock {
                declaration,
                declaration_line: line,
            });
        }
        tracing::trace!(line, "declaration block closed before position");
    }
    return None;
}

/// Name of the attribute assigned on `line`, if `character` falls on it.
/// Both ends of the identifier span count as on it.
pub fn find_variable_at(line: &str, character: usize) -> Option<String> {
    let ident = ASSIGNMENT.captures(line)?.get(1)?;
    let start = line.get(..ident.start())?.chars().count();
    let end = start.saturating_add(ident.as_str().chars().count());
    if (start..=end).contains(&character) {
        return Some(ident.as_str().to_string());
    }
    return None;
}

/// Count how many blocks deep `position` is inside the declaration starting at
/// `declaration_line`. The declaration's own opening brace is level zero.
pub fn compute_nesting_level(document: &Document, declaration_line: usize, position: Position) -> usize {
    let mut level = 0_usize;
    let mut seen_open = false;
    for brace in braces_before(document, declaration_line, position) {
        match brace {
            '{' if !seen_open => seen_open = true,
            '{' => level = level.saturating_add(1),
            _ => level = level.saturating_sub(1),
        }
    }
    return level;
}

/// Resolve the attribute under the cursor together with its enclosing declaration.
pub fn variable_context(document: &Document, position: Position) -> Option<(EnclosingBlock, VariableContext)> {
    let name = find_variable_at(document.line(position.line)?, position.character)?;
    let block = find_enclosing_block(document, position)?;
    let nesting_level = compute_nesting_level(document, block.declaration_line, position);
    return Some((block, VariableContext { name, nesting_level }));
}

/// String value of a top-level `name = "value"` attribute in the block that
/// opens on `declaration_line`. Text inside nested blocks and inline objects
/// is not searched.
pub fn find_block_attribute(document: &Document, declaration_line: usize, name: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r#"(?m)(?:^|[\s;]){}\s*=\s*"([^"]*)""#, regex::escape(name))).ok()?;
    let body = top_level_body(document, declaration_line);
    return attribute_value(&pattern, &body);
}

/// Text at depth one of the block opening on `declaration_line`, one output
/// line per source line, with nested braces and their contents removed.
fn top_level_body(document: &Document, declaration_line: usize) -> String {
    let mut body = String::new();
    let mut depth = 0_usize;
    let mut seen_open = false;

    'lines: for index in declaration_line..document.line_count() {
        let Some(text) = document.line(index) else {
            break;
        };
        for ch in text.chars() {
            match ch {
                '{' => {
                    depth = depth.saturating_add(1);
                    seen_open = true;
                },
                '}' if seen_open => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break 'lines;
                    }
                },
                _ if depth == 1 => body.push(ch),
                _ => {},
            }
        }
        if seen_open {
            body.push('\n');
        }
    }
    return body;
}

/// First capture of an attribute pattern within a segment of text.
fn attribute_value(pattern: &Regex, segment: &str) -> Option<String> {
    return pattern
        .captures(segment)
        .and_then(|caps| return caps.get(1))
        .map(|m| return m.as_str().to_string());
}

/// Whether the block opening on `declaration_line` is still open at `position`.
/// The opening brace must have been seen, and the count must never return to
/// zero on the way.
fn block_open_at(document: &Document, declaration_line: usize, position: Position) -> bool {
    let mut depth = 0_usize;
    let mut seen_open = false;
    for brace in braces_before(document, declaration_line, position) {
        if brace == '{' {
            depth = depth.saturating_add(1);
            seen_open = true;
        } else if seen_open {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return false;
            }
        }
    }
    return seen_open && depth > 0;
}

/// Every `{` and `}` from the start of `start_line` up to, not including, `position`.
fn braces_before(document: &Document, start_line: usize, position: Position) -> impl Iterator<Item = char> + '_ {
    return (start_line..=position.line)
        .filter_map(move |index| return document.line(index).map(|text| return (index, text)))
        .flat_map(move |(index, text)| {
            let limit = if index == position.line { position.character } else { usize::MAX };
            return text.chars().take(limit);
        })
        .filter(|c| return matches!(c, '{' | '}'));
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCE: &str = "\
resource \"aws_instance\" \"web\" {
  ami = \"x\"
  ebs_block_device {
    device_name = \"/dev/sdb\"
    tags {
      volume_size = 20
    }
  }
}

output \"ip\" {
  value = aws_instance.web.public_ip
}
";

    fn resource(kind: BlockKind, prefix: &str, suffix: &str, name: &str) -> Declaration {
        return Declaration::Resource(ResourceReference {
            kind,
            local_name: name.to_string(),
            provider_prefix: prefix.to_string(),
            type_suffix: suffix.to_string(),
        });
    }

    #[test]
    fn matches_resource_declaration() {
        assert_eq!(
            match_declaration("resource \"aws_instance\" \"web\" {"),
            Some(resource(BlockKind::Resource, "aws", "instance", "web"))
        );
    }

    #[test]
    fn matches_data_source_with_compound_suffix() {
        assert_eq!(
            match_declaration("  data \"google_compute_image\" \"debian\" {"),
            Some(resource(BlockKind::DataSource, "google", "compute_image", "debian"))
        );
    }

    #[test]
    fn matches_inline_module_declaration() {
        assert_eq!(
            match_declaration("module \"x\" { source = \"./y\" }"),
            Some(Declaration::Module { local_name: "x".to_string() })
        );
    }

    #[test]
    fn ignores_other_blocks_and_partial_declarations() {
        assert_eq!(match_declaration("output \"ip\" {"), None);
        assert_eq!(match_declaration("resource \"aws_instance\" {"), None);
        assert_eq!(match_declaration("resource \"instance\" \"web\" {"), None);
        assert_eq!(match_declaration("# resource \"aws_instance\" \"web\" {"), None);
    }

    #[test]
    fn top_level_attribute_has_level_zero() {
        let doc = Document::from_text("resource \"aws_instance\" \"web\" {\n  ami = \"x\"\n}");
        let pos = Position::new(1, 3);

        assert_eq!(find_variable_at(doc.line(1).unwrap(), pos.character), Some("ami".to_string()));
        let (block, var) = variable_context(&doc, pos).unwrap();
        assert_eq!(block.declaration_line, 0);
        assert_eq!(compute_nesting_level(&doc, 0, pos), 0);
        assert_eq!(var.hash_fragment(), "ami");
    }

    #[test]
    fn doubly_nested_attribute_has_level_two() {
        let doc = Document::from_text(INSTANCE);
        let (block, var) = variable_context(&doc, Position::new(5, 8)).unwrap();
        assert_eq!(block.declaration_line, 0);
        assert_eq!(var.nesting_level, 2);
        assert_eq!(var.hash_fragment(), "volume_size-2");
    }

    #[test]
    fn level_drops_back_after_nested_block_closes() {
        let doc = Document::from_text(
            "resource \"aws_instance\" \"web\" {\n  ebs_block_device {\n    a = 1\n  }\n  ami = \"x\"\n}",
        );
        assert_eq!(compute_nesting_level(&doc, 0, Position::new(2, 5)), 1);
        assert_eq!(compute_nesting_level(&doc, 0, Position::new(4, 3)), 0);
    }

    #[test]
    fn position_after_closed_block_has_no_enclosing_block() {
        let doc = Document::from_text(INSTANCE);
        assert_eq!(find_enclosing_block(&doc, Position::new(9, 0)), None);
        assert_eq!(find_enclosing_block(&doc, Position::new(11, 3)), None);
        // Just past the closing brace on its own line.
        assert_eq!(find_enclosing_block(&doc, Position::new(8, 1)), None);
    }

    #[test]
    fn closed_block_is_skipped_for_an_earlier_open_one() {
        let doc = Document::from_text(
            "data \"aws_ami\" \"a\" {\n  x = 1\n}\nresource \"aws_instance\" \"b\" {\n  ami = 1\n}",
        );
        let block = find_enclosing_block(&doc, Position::new(4, 3)).unwrap();
        assert_eq!(block.declaration_line, 3);
        let block = find_enclosing_block(&doc, Position::new(1, 3)).unwrap();
        assert_eq!(block.declaration_line, 0);
    }

    #[test]
    fn declaration_line_before_open_brace_is_outside() {
        let doc = Document::from_text("resource \"aws_instance\" \"web\" {\n}");
        assert_eq!(find_enclosing_block(&doc, Position::new(0, 5)), None);
        assert!(find_enclosing_block(&doc, Position::new(0, 31)).is_some());
    }

    #[test]
    fn variable_span_is_inclusive_at_both_ends() {
        let line = "    volume_size = 20";
        assert_eq!(find_variable_at(line, 3), None);
        assert_eq!(find_variable_at(line, 4), Some("volume_size".to_string()));
        assert_eq!(find_variable_at(line, 15), Some("volume_size".to_string()));
        assert_eq!(find_variable_at(line, 16), None);
    }

    #[test]
    fn non_assignment_lines_have_no_variable() {
        assert_eq!(find_variable_at("  ebs_block_device {", 4), None);
        assert_eq!(find_variable_at("  Name = \"x\"", 3), None);
    }

    #[test]
    fn unbalanced_text_degrades_to_none() {
        let doc = Document::from_text("resource \"aws_instance\" \"web\"\n  ami = \"x\"");
        assert_eq!(variable_context(&doc, Position::new(1, 3)), None);
    }

    #[test]
    fn reads_top_level_attribute_across_lines() {
        let doc = Document::from_text(
            "module \"vpc\" {\n  source  = \"terraform-aws-modules/vpc/aws\"\n  tags = {\n    version = \"nested\"\n  }\n  version = \"5.0.0\"\n}",
        );
        assert_eq!(
            find_block_attribute(&doc, 0, "source"),
            Some("terraform-aws-modules/vpc/aws".to_string())
        );
        assert_eq!(find_block_attribute(&doc, 0, "version"), Some("5.0.0".to_string()));
        assert_eq!(find_block_attribute(&doc, 0, "providers"), None);
    }

    #[test]
    fn reads_attribute_from_single_line_block() {
        let doc = Document::from_text("module \"x\" { source = \"./y\" }\nsource = \"outside\"");
        assert_eq!(find_block_attribute(&doc, 0, "source"), Some("./y".to_string()));
    }

    #[test]
    fn inline_object_values_are_not_top_level() {
        let doc = Document::from_text(
            "module \"vpc\" {\n  source = \"terraform-aws-modules/vpc/aws\"\n  tags = { version = \"nested\" }\n  version = \"5.0.0\"\n}",
        );
        assert_eq!(find_block_attribute(&doc, 0, "version"), Some("5.0.0".to_string()));

        let only_nested = Document::from_text("module \"x\" {\n  tags = { version = \"1.0.0\" }\n}");
        assert_eq!(find_block_attribute(&only_nested, 0, "version"), None);
    }
}
