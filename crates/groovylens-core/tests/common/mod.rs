//! Shared fixtures for integration tests

use groovylens_core::ast::{AstNode, FileAst, NodeId, NodeKind};
use groovylens_core::error::Result;
use groovylens_core::parser::{GroovyParser, ParseRequest, ParserOutput};
use groovylens_core::position::Span;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Line-oriented reader for tiny Groovy snippets, standing in for the real
/// parser. Understands just enough shapes for the pipeline scenarios:
/// classes with simple members, `def` declarations, `println` statements,
/// `new` expressions and imports. Counts its invocations so tests can
/// assert cache behavior.
#[derive(Default)]
pub struct FixtureParser {
    pub calls: Arc<AtomicUsize>,
}

impl FixtureParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GroovyParser for FixtureParser {
    fn parse(&self, request: &ParseRequest) -> Result<ParserOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ParserOutput {
            ast: Some(parse_fixture(&request.content)),
            diagnostics: Vec::new(),
        })
    }
}

struct ClassScope {
    id: NodeId,
    name: String,
    end_line: usize,
}

/// Build a [`FileAst`] from a fixture snippet. Columns are one-based, as
/// the Groovy AST reports them.
pub fn parse_fixture(content: &str) -> FileAst {
    let lines: Vec<&str> = content.lines().collect();
    let last_line = lines.len().max(1) as i32;
    let last_width = lines.last().map_or(1, |l| l.len() as i32 + 1);

    let mut builder = FileAst::builder();
    let module = builder.record(
        AstNode::new(
            NodeKind::Module,
            "script",
            Span::new(1, 1, last_line, last_width),
        ),
        None,
    );

    let mut class_scope: Option<ClassScope> = None;

    for (idx, raw) in lines.iter().enumerate() {
        let line_no = (idx + 1) as i32;
        if class_scope.as_ref().is_some_and(|scope| idx + 1 > scope.end_line) {
            class_scope = None;
        }

        let line = raw.trim_end();
        let trimmed = line.trim_start();
        let indent = (line.len() - trimmed.len()) as i32;
        let parent = class_scope.as_ref().map_or(module, |scope| scope.id);
        let line_end = line.len() as i32 + 1;

        if let Some(rest) = trimmed.strip_prefix("import ") {
            let mut parts = rest.split(" as ");
            let class_name = parts.next().unwrap_or("").trim().to_string();
            let binding = parts
                .next()
                .map(|alias| alias.trim().to_string())
                .unwrap_or_else(|| class_name.clone());
            builder.record(
                AstNode::new(
                    NodeKind::Import,
                    binding,
                    Span::new(line_no, indent + 1, line_no, line_end),
                )
                .with_metadata(serde_json::json!({ "class_name": class_name })),
                Some(module),
            );
        } else if let Some(rest) = trimmed.strip_prefix("class ") {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            let end_line = lines[idx + 1..]
                .iter()
                .position(|l| l.trim() == "}")
                .map_or(idx + 1, |p| idx + 1 + p + 1);
            let id = builder.record(
                AstNode::new(
                    NodeKind::ClassDecl,
                    name.clone(),
                    Span::new(line_no, indent + 1, end_line as i32, 2),
                ),
                Some(module),
            );
            class_scope = Some(ClassScope {
                id,
                name,
                end_line,
            });
        } else if let Some(rest) = trimmed.strip_prefix("def ") {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            let name_col = indent + 5;
            let decl = builder.record(
                AstNode::new(
                    NodeKind::VariableDecl,
                    name.clone(),
                    Span::new(line_no, name_col, line_no, name_col + name.len() as i32),
                ),
                Some(parent),
            );
            if let Some(eq) = rest.find('=') {
                let value = rest[eq + 1..].trim();
                if !value.is_empty() {
                    let value_col = line.len() as i32 - value.len() as i32 + 1;
                    builder.record(
                        AstNode::new(
                            NodeKind::Constant,
                            value,
                            Span::new(line_no, value_col, line_no, line_end),
                        ),
                        Some(decl),
                    );
                }
            }
        } else if let Some(rest) = trimmed.strip_prefix("println ") {
            let call = builder.record(
                AstNode::new(
                    NodeKind::MethodCall,
                    "println",
                    Span::new(line_no, indent + 1, line_no, line_end),
                ),
                Some(parent),
            );
            let arg = rest.trim();
            let is_identifier = !arg.is_empty()
                && !arg.starts_with(|c: char| c.is_ascii_digit())
                && arg.chars().all(|c| c.is_alphanumeric() || c == '_');
            if is_identifier {
                let arg_col = indent + 9;
                builder.record(
                    AstNode::new(
                        NodeKind::VariableRef,
                        arg,
                        Span::new(line_no, arg_col, line_no, arg_col + arg.len() as i32),
                    ),
                    Some(call),
                );
            }
        } else if class_scope.is_some() && is_member_line(trimmed) {
            let mut parts = trimmed.split_whitespace();
            let type_name = parts.next().unwrap_or_default();
            let member = parts.next().unwrap_or_default();
            let name_col = indent + type_name.len() as i32 + 2;
            let scope = class_scope.as_ref().unwrap();
            builder.record(
                AstNode::new(
                    NodeKind::FieldDecl,
                    member,
                    Span::new(line_no, name_col, line_no, name_col + member.len() as i32),
                )
                .with_owner(scope.name.clone())
                .with_signature(type_name),
                Some(scope.id),
            );
        }

        if let Some(pos) = line.find("new ") {
            let name_start = pos + 4;
            let name: String = line[name_start..]
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '.' || *c == '_')
                .collect();
            if !name.is_empty() {
                let col = name_start as i32 + 1;
                builder.record(
                    AstNode::new(
                        NodeKind::ConstructorCall,
                        name.clone(),
                        Span::new(line_no, col, line_no, col + name.len() as i32),
                    ),
                    Some(parent),
                );
            }
        }
    }

    builder.build()
}

fn is_member_line(trimmed: &str) -> bool {
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    parts.len() == 2
        && parts
            .iter()
            .all(|part| part.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// Write a fixture JAR with empty entries at the given resource paths
pub fn write_fixture_jar(path: &std::path::Path, entries: &[&str]) {
    use std::io::Write;
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for entry in entries {
        writer
            .start_file(entry.to_string(), zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"\xca\xfe\xba\xbe").unwrap();
    }
    writer.finish().unwrap();
}
