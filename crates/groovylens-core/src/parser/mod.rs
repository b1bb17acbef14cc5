//! External parser interface
//!
//! The Groovy parser itself is an external collaborator: anything that can
//! turn `(uri, content, classpath)` into a [`FileAst`] plus diagnostics
//! plugs in behind the [`GroovyParser`] trait. The compilation service owns
//! caching, coalescing and failure translation on top of this seam.

use crate::ast::FileAst;
use crate::classpath::Classpath;
use crate::error::Result;
use crate::position::Span;
use crate::symbols::SymbolIndex;
use crate::uri::DocumentUri;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Compiler phase to run a parse up to, ordered from earliest to latest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilePhase {
    /// Syntax tree conversion only
    Conversion,
    /// Name and import resolution
    SemanticAnalysis,
    /// AST canonicalization
    Canonicalization,
    /// Full class generation
    ClassGeneration,
}

impl Default for CompilePhase {
    fn default() -> Self {
        CompilePhase::Canonicalization
    }
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Severity of a parser diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Compilation error
    Error,
    /// Warning
    Warning,
    /// Informational note
    Info,
    /// Hint
    Hint,
}

/// A structured problem reported by the parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Source range the diagnostic applies to
    pub span: Span,
    /// Severity
    pub severity: Severity,
    /// Producer of the diagnostic (e.g. `groovy`)
    pub source: String,
    /// Human-readable message
    pub message: String,
    /// Optional machine-readable code
    pub code: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic attributed to the Groovy compiler
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Error,
            source: "groovy".to_string(),
            message: message.into(),
            code: None,
        }
    }

    /// Create a warning diagnostic attributed to the Groovy compiler
    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            source: "groovy".to_string(),
            message: message.into(),
            code: None,
        }
    }

    /// Set the machine-readable code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// blake3 hash of a document's content, the second half of every cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash document content
    pub fn of(content: &str) -> Self {
        Self(*blake3::hash(content.as_bytes()).as_bytes())
    }

    /// Hex form for logging
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..8])
    }
}

/// Everything a parser invocation needs
#[derive(Debug, Clone)]
pub struct ParseRequest {
    /// Document being parsed
    pub uri: DocumentUri,
    /// Document content
    pub content: String,
    /// Effective classpath for this document
    pub classpath: Classpath,
    /// Source roots of the workspace
    pub source_roots: Vec<PathBuf>,
    /// Other workspace sources the parser may resolve against
    pub workspace_sources: Vec<PathBuf>,
    /// Whether to run the full recursive AST visitor. Workspace indexing
    /// turns this off and keeps only declaration-level nodes.
    pub recursive_visitor: bool,
    /// Phase to compile up to
    pub phase: CompilePhase,
}

impl ParseRequest {
    /// Create a full-visit request with empty workspace context
    pub fn new(uri: DocumentUri, content: impl Into<String>, phase: CompilePhase) -> Self {
        Self {
            uri,
            content: content.into(),
            classpath: Classpath::default(),
            source_roots: Vec::new(),
            workspace_sources: Vec::new(),
            recursive_visitor: true,
            phase,
        }
    }
}

/// What a parser invocation produced
#[derive(Debug, Default)]
pub struct ParserOutput {
    /// The AST, absent when compilation failed fatally
    pub ast: Option<FileAst>,
    /// Problems found along the way; may be non-empty on success
    pub diagnostics: Vec<Diagnostic>,
}

/// The parser seam. Implementations must be deterministic for a given
/// request and report failures through `Err`/diagnostics, never panic.
pub trait GroovyParser: Send + Sync {
    /// Parse one document
    fn parse(&self, request: &ParseRequest) -> Result<ParserOutput>;
}

/// Outcome of one compile invocation of one document, as cached and served
#[derive(Debug)]
pub struct ParseResult {
    /// Document this result belongs to
    pub uri: DocumentUri,
    /// Hash of the content that produced this result
    pub content_hash: ContentHash,
    /// Phase the parse ran to
    pub phase: CompilePhase,
    /// The AST; `None` means the parse failed fatally
    pub ast: Option<Arc<FileAst>>,
    /// Symbol index derived from the AST
    pub symbols: Option<Arc<SymbolIndex>>,
    /// Parser diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Build a successful result, deriving the symbol index from the AST
    pub fn success(
        uri: DocumentUri,
        content_hash: ContentHash,
        phase: CompilePhase,
        ast: FileAst,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let symbols = SymbolIndex::build(&ast);
        Self {
            uri,
            content_hash,
            phase,
            ast: Some(Arc::new(ast)),
            symbols: Some(Arc::new(symbols)),
            diagnostics,
        }
    }

    /// Build a failed result carrying only diagnostics
    pub fn failure(
        uri: DocumentUri,
        content_hash: ContentHash,
        phase: CompilePhase,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            uri,
            content_hash,
            phase,
            ast: None,
            symbols: None,
            diagnostics,
        }
    }

    /// Whether the parse produced an AST
    pub fn is_successful(&self) -> bool {
        self.ast.is_some()
    }

    /// Diagnostics of at least `Error` severity
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}
