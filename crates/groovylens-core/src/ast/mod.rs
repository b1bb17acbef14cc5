//! Arena-backed AST model
//!
//! The parser produces one [`FileAst`] per document: an arena of nodes plus
//! a child-to-parent map, so upward navigation needs no back-pointers inside
//! nodes. [`AstModel`] holds the per-URI asts behind `Arc`s; replacing a
//! document's ast is atomic and readers keep whichever snapshot they grabbed.

use crate::position::{span_contains, span_is_valid, SourcePosition, Span};
use crate::uri::DocumentUri;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of a node inside one file's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Placeholder id carried by nodes not yet recorded into an arena
    pub const UNSET: NodeId = NodeId(u32::MAX);

    /// Arena index of this id
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Syntactic category of an AST node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The module (script/file) root
    Module,
    /// A package declaration
    Package,
    /// An import statement
    Import,
    /// An annotation
    Annotation,
    /// A class declaration
    ClassDecl,
    /// A method declaration
    MethodDecl,
    /// A field declaration
    FieldDecl,
    /// A property declaration
    PropertyDecl,
    /// A method or closure parameter
    Parameter,
    /// A local variable declaration expression
    VariableDecl,
    /// A reference to a variable
    VariableRef,
    /// A method call
    MethodCall,
    /// A property access expression
    PropertyAccess,
    /// A constructor call (`new Foo(...)`)
    ConstructorCall,
    /// A bare class reference expression
    ClassRef,
    /// A constant/literal expression
    Constant,
    /// An argument list
    ArgumentList,
    /// An expression statement wrapper
    ExprStatement,
    /// Anything the parser did not classify
    Unknown,
}

impl NodeKind {
    /// Tie-break priority for position queries: when two nodes cover the
    /// same range, the one the user actually points at (a reference, a
    /// declaration, a call) must win over its enclosing containers.
    pub fn priority(self) -> i64 {
        match self {
            NodeKind::VariableRef => 0,
            NodeKind::VariableDecl | NodeKind::Parameter => 1,
            NodeKind::MethodCall | NodeKind::ConstructorCall => 2,
            NodeKind::PropertyAccess | NodeKind::ClassRef => 3,
            NodeKind::FieldDecl | NodeKind::PropertyDecl => 4,
            NodeKind::MethodDecl => 5,
            NodeKind::Import | NodeKind::Annotation => 6,
            NodeKind::Constant => 7,
            NodeKind::Package | NodeKind::ClassDecl => 8,
            NodeKind::ArgumentList | NodeKind::ExprStatement => 9,
            NodeKind::Module | NodeKind::Unknown => 10,
        }
    }

    /// Whether this kind introduces a named entity
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::ClassDecl
                | NodeKind::MethodDecl
                | NodeKind::FieldDecl
                | NodeKind::PropertyDecl
                | NodeKind::Parameter
                | NodeKind::VariableDecl
                | NodeKind::Import
        )
    }

    /// Whether this kind names a previously declared entity
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            NodeKind::VariableRef
                | NodeKind::MethodCall
                | NodeKind::PropertyAccess
                | NodeKind::ConstructorCall
                | NodeKind::ClassRef
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A node in a file's AST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    /// Arena id, assigned when the node is recorded
    pub id: NodeId,
    /// Node category
    pub kind: NodeKind,
    /// Name of the referenced or declared entity (class name for
    /// constructor calls, empty for unnamed containers)
    pub name: String,
    /// Source location
    pub span: Span,
    /// Declaring class name for members, `None` at script level
    pub owner: Option<String>,
    /// Optional type signature (return type, variable type, parameters)
    pub signature: Option<String>,
    /// Parser-specific extras (modifiers, initial value, alias targets)
    pub metadata: serde_json::Value,
}

impl AstNode {
    /// Create a node; the id stays [`NodeId::UNSET`] until recorded
    pub fn new(kind: NodeKind, name: impl Into<String>, span: Span) -> Self {
        Self {
            id: NodeId::UNSET,
            kind,
            name: name.into(),
            span,
            owner: None,
            signature: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the declaring class
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set the type signature
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Set parser metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the node has a real source location
    pub fn has_valid_position(&self) -> bool {
        span_is_valid(&self.span)
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' at {}", self.kind, self.name, self.span)
    }
}

// Position-query weights: line extent dominates, column extent breaks ties
// on a single line, kind priority breaks exact-range ties.
const LINE_WEIGHT: i64 = 1_000;
const MAX_RANGE: i64 = 999;
const TYPE_WEIGHT: i64 = 10;

fn node_score(node: &AstNode) -> i64 {
    let span = &node.span;
    let line_extent = i64::from(span.end_line - span.start_line) * LINE_WEIGHT;
    let column_extent = if span.is_single_line() {
        i64::from(span.end_column - span.start_column)
    } else {
        MAX_RANGE
    };
    line_extent + column_extent + node.kind.priority() * TYPE_WEIGHT
}

/// The complete AST of one document: node arena plus parent map
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileAst {
    nodes: Vec<AstNode>,
    parents: HashMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl FileAst {
    /// Start building a file AST
    pub fn builder() -> FileAstBuilder {
        FileAstBuilder {
            ast: FileAst::default(),
        }
    }

    /// All nodes in arena order
    pub fn nodes(&self) -> &[AstNode] {
        &self.nodes
    }

    /// Node by id
    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        self.nodes.get(id.index())
    }

    /// Parent of a node, `None` for the module root
    pub fn parent(&self, id: NodeId) -> Option<&AstNode> {
        self.parents.get(&id).and_then(|parent| self.get(*parent))
    }

    /// The module root node, if one was recorded
    pub fn root(&self) -> Option<&AstNode> {
        self.root.and_then(|id| self.get(id))
    }

    /// All class declaration nodes of this file
    pub fn class_nodes(&self) -> impl Iterator<Item = &AstNode> {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::ClassDecl)
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The smallest node whose range contains `position`, ties broken by
    /// kind priority so containers never shadow the symbol under the cursor.
    pub fn node_at(&self, position: SourcePosition) -> Option<&AstNode> {
        self.nodes
            .iter()
            .filter(|node| node.has_valid_position() && span_contains(&node.span, position))
            .min_by_key(|node| node_score(node))
    }
}

/// Builder populated during parser-driven traversal
#[derive(Debug)]
pub struct FileAstBuilder {
    ast: FileAst,
}

impl FileAstBuilder {
    /// Record a node under an optional parent, returning its assigned id.
    ///
    /// Parents must be recorded before their children, which makes the
    /// parent map acyclic by construction. The first parentless node becomes
    /// the module root.
    pub fn record(&mut self, mut node: AstNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.ast.nodes.len() as u32);
        node.id = id;
        self.ast.nodes.push(node);

        match parent {
            Some(parent) => {
                debug_assert!(parent.index() < id.index(), "parent recorded after child");
                self.ast.parents.insert(id, parent);
            }
            None => {
                if self.ast.root.is_none() {
                    self.ast.root = Some(id);
                }
            }
        }
        id
    }

    /// Finish building
    pub fn build(self) -> FileAst {
        self.ast
    }
}

/// Per-process AST store, keyed by canonical document URI
#[derive(Debug, Default)]
pub struct AstModel {
    files: DashMap<DocumentUri, Arc<FileAst>>,
}

impl AstModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace a document's AST
    pub fn replace(&self, uri: DocumentUri, ast: impl Into<Arc<FileAst>>) -> Arc<FileAst> {
        let ast = ast.into();
        self.files.insert(uri, Arc::clone(&ast));
        ast
    }

    /// Remove a document's AST
    pub fn remove(&self, uri: &DocumentUri) {
        self.files.remove(uri);
    }

    /// Snapshot of a document's AST
    pub fn file(&self, uri: &DocumentUri) -> Option<Arc<FileAst>> {
        self.files.get(uri).map(|entry| Arc::clone(&entry))
    }

    /// All nodes of a document
    pub fn nodes_for(&self, uri: &DocumentUri) -> Vec<AstNode> {
        self.file(uri)
            .map(|ast| ast.nodes().to_vec())
            .unwrap_or_default()
    }

    /// The smallest node at a source position
    pub fn node_at(&self, uri: &DocumentUri, position: SourcePosition) -> Option<AstNode> {
        self.file(uri)?.node_at(position).cloned()
    }

    /// Parent of a node
    pub fn parent(&self, uri: &DocumentUri, id: NodeId) -> Option<AstNode> {
        self.file(uri)?.parent(id).cloned()
    }

    /// Class declarations of one document
    pub fn class_nodes(&self, uri: &DocumentUri) -> Vec<AstNode> {
        self.file(uri)
            .map(|ast| ast.class_nodes().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether this exact node id is a class declaration of the document.
    /// Used to tell real class declarations apart from reference
    /// placeholders the parser synthesizes with the same shape.
    pub fn contains_class_node(&self, uri: &DocumentUri, id: NodeId) -> bool {
        self.file(uri)
            .map(|ast| {
                ast.get(id)
                    .is_some_and(|node| node.kind == NodeKind::ClassDecl)
            })
            .unwrap_or(false)
    }

    /// Every node of every loaded document
    pub fn all_nodes(&self) -> Vec<(DocumentUri, AstNode)> {
        self.files
            .iter()
            .flat_map(|entry| {
                let uri = entry.key().clone();
                entry
                    .value()
                    .nodes()
                    .iter()
                    .cloned()
                    .map(|node| (uri.clone(), node))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Class declarations across every loaded document
    pub fn all_class_nodes(&self) -> Vec<(DocumentUri, AstNode)> {
        self.files
            .iter()
            .flat_map(|entry| {
                let uri = entry.key().clone();
                entry
                    .value()
                    .class_nodes()
                    .cloned()
                    .map(|node| (uri.clone(), node))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// URIs with a loaded AST
    pub fn uris(&self) -> Vec<DocumentUri> {
        self.files.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop every loaded AST
    pub fn clear(&self) {
        self.files.clear();
    }
}
