//! groovylens - compilation, indexing and resolution core for Groovy tooling
//!
//! This crate is the engine behind editor features for Groovy: a
//! cache-backed compilation service over an external parser, an
//! arena-backed AST model with per-document symbol indexes, a multi-tier
//! definition resolver, and an asynchronous dependency subsystem that keeps
//! the classpath fresh as build files change.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod classpath;
pub mod compiler;
pub mod deps;
pub mod error;
pub mod parser;
pub mod position;
pub mod resolver;
pub mod symbols;
pub mod uri;
pub mod workspace;

pub use ast::{AstModel, AstNode, FileAst, FileAstBuilder, NodeId, NodeKind};
pub use classpath::{ClassContainer, ClassEntry, Classpath, ClasspathService};
pub use compiler::{
    CompilationService, CompileInterrupted, IndexingProgress, NoOpIndexingProgress, SharedCompile,
};
pub use deps::hub::{CentralizedDependencyManager, DependencyListener};
pub use deps::{
    BuildFileWatcher, CompositeResolver, DependencyManager, DependencyResolver, DependencyState,
    NoOpResolutionObserver, ResolutionObserver, WorkspaceResolution,
};
pub use error::{Error, Result};
pub use parser::{
    CompilePhase, ContentHash, Diagnostic, GroovyParser, ParseRequest, ParseResult, ParserOutput,
    Severity,
};
pub use position::{
    lsp_to_source, source_to_lsp, span_contains, span_is_valid, Position, SourcePosition, Span,
};
pub use resolver::{
    DefinitionResolver, DefinitionResult, ResolutionError, ResolvedTarget, TargetKind,
};
pub use symbols::{SymbolIndex, SymbolKind};
pub use uri::DocumentUri;
pub use workspace::{
    FlavorDetector, FlavorProvider, JenkinsDetector, JenkinsProvider, JenkinsWorkspaceConfig,
    SpockDetector, SpockProvider, WorkspaceManager, WorkspaceModel,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ast::{AstModel, AstNode, FileAst, FileAstBuilder, NodeId, NodeKind};
    pub use crate::classpath::{Classpath, ClasspathService};
    pub use crate::compiler::{CompilationService, IndexingProgress, NoOpIndexingProgress};
    pub use crate::deps::hub::{CentralizedDependencyManager, DependencyListener};
    pub use crate::deps::{
        BuildFileWatcher, DependencyManager, DependencyResolver, DependencyState,
        ResolutionObserver, WorkspaceResolution,
    };
    pub use crate::error::{Error, Result};
    pub use crate::parser::{
        CompilePhase, ContentHash, Diagnostic, GroovyParser, ParseRequest, ParseResult, Severity,
    };
    pub use crate::position::{Position, SourcePosition, Span};
    pub use crate::resolver::{
        DefinitionResolver, DefinitionResult, ResolutionError, TargetKind,
    };
    pub use crate::symbols::{SymbolIndex, SymbolKind};
    pub use crate::uri::DocumentUri;
    pub use crate::workspace::{
        FlavorDetector, FlavorProvider, WorkspaceManager, WorkspaceModel,
    };
}
