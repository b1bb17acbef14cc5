//! Definition resolution
//!
//! Maps a cursor position onto the declaration of the symbol under it,
//! searching three tiers in order: the document's own scope, the symbol
//! storages of the whole workspace, and finally the binary classpath.
//! Every failure mode is a typed [`ResolutionError`]; nothing below this
//! boundary leaks parser internals to feature providers.

use crate::ast::{AstModel, AstNode, NodeKind};
use crate::compiler::CompilationService;
use crate::position::{lsp_to_source, Position};
use crate::symbols::{SymbolIndex, SymbolKind};
use crate::uri::DocumentUri;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Bound on the local resolution walk; exceeding it means the symbol graph
/// cycles (alias loops, mutual inheritance)
const MAX_RESOLVE_DEPTH: usize = 64;

/// Why a definition could not be produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The query position or the resolved node's position is invalid
    #[error("invalid position")]
    InvalidPosition,
    /// No AST node covers the query position
    #[error("no node found at position")]
    NodeNotFoundAtPosition,
    /// Resolution would not terminate
    #[error("circular reference detected")]
    CircularReference,
    /// A node exists at the position but no declaration could be located
    #[error("symbol not found: {symbol}")]
    SymbolNotFound {
        /// Display form of the node that failed to resolve
        symbol: String,
    },
}

impl ResolutionError {
    fn symbol_not_found(node: &AstNode) -> Self {
        Self::SymbolNotFound {
            symbol: node.to_string(),
        }
    }
}

/// A located definition
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionResult {
    /// A declaration with source available
    Source {
        /// Document holding the declaration
        uri: DocumentUri,
        /// The declaration node
        node: AstNode,
    },
    /// A compiled class on the classpath, no source available
    Binary {
        /// `jar:file:` or `file:` URI of the class resource
        uri: DocumentUri,
        /// Fully qualified class name
        class_name: String,
    },
}

/// What kinds of targets a multi-target query wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// The declaration itself
    Declaration,
    /// Same-symbol references
    Reference,
}

/// One target of a multi-target query
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    /// Whether this is the declaration or a reference
    pub kind: TargetKind,
    /// Document holding the target
    pub uri: DocumentUri,
    /// Target node
    pub node: AstNode,
}

/// Resolves positions to declarations across local, workspace and binary
/// classpath tiers
pub struct DefinitionResolver {
    compiler: CompilationService,
}

impl DefinitionResolver {
    /// Create a resolver over a compilation service
    pub fn new(compiler: CompilationService) -> Self {
        Self { compiler }
    }

    /// Find the definition of the symbol at an LSP position
    pub fn find_definition_at(
        &self,
        uri: &DocumentUri,
        position: Position,
    ) -> Result<DefinitionResult, ResolutionError> {
        if !position.is_valid() {
            return Err(ResolutionError::InvalidPosition);
        }

        let ast_model = self.compiler.ast_model();
        let node = ast_model
            .node_at(uri, lsp_to_source(position))
            .ok_or(ResolutionError::NodeNotFoundAtPosition)?;
        tracing::debug!(uri = %uri, node = %node, "resolving definition");

        let mut lookup_name: Option<String> = None;
        if let Some(declaration) = self.resolve_local(uri, &node)? {
            if declaration.kind == NodeKind::Import {
                // An import is not the definition, it names one: tunnel
                // through to the imported class in the workspace tiers.
                lookup_name = Some(import_class_name(&declaration));
            } else if declaration.kind == NodeKind::ClassDecl
                && !ast_model.contains_class_node(uri, declaration.id)
            {
                // A class declaration that is not actually among this
                // document's class nodes is a reference placeholder the
                // parser synthesized; fall through to the workspace tiers.
                lookup_name = Some(declaration.name.clone());
            } else {
                return finish_source(uri.clone(), declaration);
            }
        }

        let Some(class_name) = lookup_name.or_else(|| referenced_class_name(&node)) else {
            return Err(ResolutionError::symbol_not_found(&node));
        };

        if let Some((decl_uri, declaration)) = self.resolve_global(&ast_model, &class_name) {
            return finish_source(decl_uri, declaration);
        }

        if let Some(binary) = self.resolve_classpath(uri, &node, &class_name) {
            return Ok(binary);
        }

        Err(ResolutionError::symbol_not_found(&node))
    }

    /// Multi-target variant: declaration and/or same-symbol references
    pub fn find_targets_at(
        &self,
        uri: &DocumentUri,
        position: Position,
        kinds: &[TargetKind],
    ) -> Result<Vec<ResolvedTarget>, ResolutionError> {
        let definition = self.find_definition_at(uri, position)?;
        let DefinitionResult::Source {
            uri: decl_uri,
            node: declaration,
        } = definition
        else {
            // Binary definitions have no source node to anchor targets on.
            return Ok(Vec::new());
        };

        let mut targets = Vec::new();
        if kinds.contains(&TargetKind::Declaration) {
            targets.push(ResolvedTarget {
                kind: TargetKind::Declaration,
                uri: decl_uri.clone(),
                node: declaration.clone(),
            });
        }

        if kinds.contains(&TargetKind::Reference) {
            let ast_model = self.compiler.ast_model();
            let mut uris = ast_model.uris();
            uris.sort();
            for scan_uri in uris {
                let Some(ast) = ast_model.file(&scan_uri) else {
                    continue;
                };
                for node in ast.nodes() {
                    if node.kind.is_reference()
                        && node.has_valid_position()
                        && node.name == declaration.name
                    {
                        targets.push(ResolvedTarget {
                            kind: TargetKind::Reference,
                            uri: scan_uri.clone(),
                            node: node.clone(),
                        });
                    }
                }
            }
        }

        Ok(targets)
    }

    /// Walk the node through the document's own symbol index. Terminates by
    /// construction: each step either ends at a declaration or consumes one
    /// entry of the visited set, and the depth is bounded.
    fn resolve_local(
        &self,
        uri: &DocumentUri,
        node: &AstNode,
    ) -> Result<Option<AstNode>, ResolutionError> {
        let Some(symbols) = self.compiler.symbol_table(uri) else {
            return Ok(None);
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut current = node.clone();

        for _ in 0..MAX_RESOLVE_DEPTH {
            if current.kind.is_declaration() {
                // Import aliases chain: `import a.B as C` resolves through
                // the alias target, which may itself be aliased.
                if let Some(alias) = alias_target(&current) {
                    if !visited.insert(alias.clone()) {
                        return Err(ResolutionError::CircularReference);
                    }
                    match lookup_named(&symbols, &alias) {
                        Some(next) => {
                            current = next;
                            continue;
                        }
                        None => return Ok(Some(current)),
                    }
                }
                return Ok(Some(current));
            }

            if !current.kind.is_reference() {
                return Ok(None);
            }

            if !visited.insert(current.name.clone()) {
                return Err(ResolutionError::CircularReference);
            }
            match lookup_declaration(&symbols, &current) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }

        Err(ResolutionError::CircularReference)
    }

    /// Search every workspace symbol storage for a class, re-fetching the
    /// node from the declaring document's AST when it is loaded.
    fn resolve_global(
        &self,
        ast_model: &AstModel,
        class_name: &str,
    ) -> Option<(DocumentUri, AstNode)> {
        let storages = self.compiler.all_symbol_storages();
        let mut uris: Vec<_> = storages.keys().cloned().collect();
        uris.sort();

        for storage_uri in uris {
            let index = &storages[&storage_uri];
            let Some(stored) = index.class_named(class_name) else {
                continue;
            };

            // Prefer the live AST node over the stored clone.
            let node = ast_model
                .file(&storage_uri)
                .and_then(|ast| ast.get(stored.id).cloned())
                .filter(|node| node.kind == NodeKind::ClassDecl)
                .unwrap_or_else(|| stored.clone());

            tracing::debug!(class = class_name, uri = %storage_uri, "global definition hit");
            return Some((storage_uri, node));
        }
        None
    }

    /// Last tier: the binary classpath. Tries the qualified name as given,
    /// an import of the simple name, and the bare name in that order.
    fn resolve_classpath(
        &self,
        uri: &DocumentUri,
        node: &AstNode,
        class_name: &str,
    ) -> Option<DefinitionResult> {
        for candidate in classpath_candidates(self.compiler.symbol_table(uri), class_name) {
            if let Some(class_uri) = self.compiler.find_classpath_class(&candidate) {
                tracing::debug!(class = %candidate, uri = %class_uri, "binary definition hit");
                return Some(DefinitionResult::Binary {
                    uri: class_uri,
                    class_name: candidate,
                });
            }
        }
        tracing::debug!(node = %node, "no classpath definition");
        None
    }
}

/// A `Source` result must point somewhere real; surface bogus declaration
/// positions instead of navigating the editor to them.
fn finish_source(uri: DocumentUri, node: AstNode) -> Result<DefinitionResult, ResolutionError> {
    if !node.has_valid_position() {
        return Err(ResolutionError::InvalidPosition);
    }
    Ok(DefinitionResult::Source { uri, node })
}

/// Class name a node refers to, for the global and classpath tiers
fn referenced_class_name(node: &AstNode) -> Option<String> {
    match node.kind {
        NodeKind::ConstructorCall | NodeKind::ClassRef | NodeKind::ClassDecl => {
            Some(node.name.clone())
        }
        NodeKind::Import => Some(node.name.clone()),
        _ => None,
    }
}

/// Fully qualified class an import names. Parsers record it in the node
/// metadata; the node name (the visible binding) is the fallback.
fn import_class_name(node: &AstNode) -> String {
    node.metadata
        .get("class_name")
        .and_then(|value| value.as_str())
        .unwrap_or(node.name.as_str())
        .to_string()
}

/// Alias target recorded on an import (`import a.B as C`)
fn alias_target(node: &AstNode) -> Option<String> {
    if node.kind != NodeKind::Import {
        return None;
    }
    node.metadata
        .get("alias_for")
        .and_then(|value| value.as_str())
        .map(str::to_string)
}

/// Declaration a reference node points at, within one symbol index
fn lookup_declaration(symbols: &SymbolIndex, reference: &AstNode) -> Option<AstNode> {
    let name = reference.name.as_str();
    let found = match reference.kind {
        NodeKind::VariableRef => symbols.lookup_any(name),
        NodeKind::MethodCall => symbols
            .methods_named(name)
            .first()
            .or_else(|| symbols.lookup_any(name)),
        NodeKind::PropertyAccess => symbols
            .lookup(SymbolKind::Property, name)
            .or_else(|| symbols.lookup(SymbolKind::Field, name))
            .or_else(|| symbols.lookup_any(name)),
        NodeKind::ConstructorCall | NodeKind::ClassRef => symbols
            .class_named(name)
            .or_else(|| symbols.lookup(SymbolKind::Import, simple_name(name))),
        _ => None,
    };
    found.cloned()
}

/// Lookup used while chasing alias chains: class first, then import, then
/// anything
fn lookup_named(symbols: &SymbolIndex, name: &str) -> Option<AstNode> {
    symbols
        .class_named(name)
        .or_else(|| symbols.lookup(SymbolKind::Import, simple_name(name)))
        .or_else(|| symbols.lookup_any(name))
        .cloned()
}

fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Candidate fully qualified names to probe on the binary classpath: the
/// name as given when already qualified, otherwise an import of the simple
/// name first, then the bare name (default package).
fn classpath_candidates(
    symbols: Option<Arc<SymbolIndex>>,
    class_name: &str,
) -> Vec<String> {
    let mut candidates = Vec::new();
    if class_name.contains('.') {
        candidates.push(class_name.to_string());
        return candidates;
    }

    if let Some(symbols) = &symbols {
        if let Some(import) = symbols.lookup(SymbolKind::Import, class_name) {
            let imported = import
                .metadata
                .get("class_name")
                .and_then(|value| value.as_str())
                .unwrap_or(import.name.as_str());
            if imported.contains('.') {
                candidates.push(imported.to_string());
            }
        }
    }
    candidates.push(class_name.to_string());
    candidates
}
