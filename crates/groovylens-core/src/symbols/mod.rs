//! Per-document symbol index
//!
//! A [`SymbolIndex`] maps declared names to their declaration nodes for one
//! document. It is built in a single pass over a [`FileAst`] and never
//! mutated afterwards; a content change produces a whole new index. Indexes
//! store cloned nodes rather than arena ids so documents that were only
//! symbol-indexed (their full AST never retained) can still answer
//! definition queries.

use crate::ast::{AstNode, FileAst, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of symbol a declaration introduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Local variable
    Variable,
    /// Method/closure parameter
    Parameter,
    /// Method (overloadable: several declarations may share a name)
    Method,
    /// Class
    Class,
    /// Import (indexed by alias, else by the last segment)
    Import,
    /// Field
    Field,
    /// Property
    Property,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Declaration tables for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolIndex {
    variables: HashMap<String, AstNode>,
    parameters: HashMap<String, AstNode>,
    methods: HashMap<String, Vec<AstNode>>,
    classes: HashMap<String, AstNode>,
    imports: HashMap<String, AstNode>,
    fields: HashMap<String, AstNode>,
    properties: HashMap<String, AstNode>,
    /// Class name -> member name -> member node
    class_members: HashMap<String, HashMap<String, AstNode>>,
}

impl SymbolIndex {
    /// Build an index from a file's AST.
    ///
    /// Only declarations with a real source position are indexed; rebuilding
    /// from the same AST yields an equal index.
    pub fn build(ast: &FileAst) -> Self {
        let mut index = Self::default();
        for node in ast.nodes() {
            if !node.has_valid_position() {
                continue;
            }
            index.record(node);
        }
        index
    }

    fn record(&mut self, node: &AstNode) {
        match node.kind {
            NodeKind::VariableDecl => {
                self.variables.insert(node.name.clone(), node.clone());
            }
            NodeKind::Parameter => {
                self.parameters.insert(node.name.clone(), node.clone());
            }
            NodeKind::MethodDecl => {
                self.methods
                    .entry(node.name.clone())
                    .or_default()
                    .push(node.clone());
                self.record_member(node);
            }
            NodeKind::ClassDecl => {
                let simple = simple_class_name(&node.name).to_string();
                self.classes.insert(simple, node.clone());
            }
            NodeKind::Import => {
                // `import a.b.C as D` indexes under D; plain imports under C.
                self.imports
                    .insert(simple_class_name(&node.name).to_string(), node.clone());
            }
            NodeKind::FieldDecl => {
                self.fields.insert(node.name.clone(), node.clone());
                self.record_member(node);
            }
            NodeKind::PropertyDecl => {
                self.properties.insert(node.name.clone(), node.clone());
                self.record_member(node);
            }
            _ => {}
        }
    }

    fn record_member(&mut self, node: &AstNode) {
        if let Some(owner) = &node.owner {
            self.class_members
                .entry(simple_class_name(owner).to_string())
                .or_default()
                .insert(node.name.clone(), node.clone());
        }
    }

    /// Single-valued lookup by kind
    pub fn lookup(&self, kind: SymbolKind, name: &str) -> Option<&AstNode> {
        match kind {
            SymbolKind::Variable => self.variables.get(name),
            SymbolKind::Parameter => self.parameters.get(name),
            SymbolKind::Method => self.methods.get(name).and_then(|list| list.first()),
            SymbolKind::Class => self.classes.get(name),
            SymbolKind::Import => self.imports.get(name),
            SymbolKind::Field => self.fields.get(name),
            SymbolKind::Property => self.properties.get(name),
        }
    }

    /// All method declarations sharing a name
    pub fn methods_named(&self, name: &str) -> &[AstNode] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Class declaration by simple (package-free) name
    pub fn class_named(&self, name: &str) -> Option<&AstNode> {
        self.classes.get(simple_class_name(name))
    }

    /// A member of a class, by class and member name
    pub fn class_member(&self, class: &str, member: &str) -> Option<&AstNode> {
        self.class_members
            .get(simple_class_name(class))
            .and_then(|members| members.get(member))
    }

    /// First declaration matching a name, searched in scope order:
    /// variables, parameters, fields, properties, methods, classes, imports.
    pub fn lookup_any(&self, name: &str) -> Option<&AstNode> {
        self.variables
            .get(name)
            .or_else(|| self.parameters.get(name))
            .or_else(|| self.fields.get(name))
            .or_else(|| self.properties.get(name))
            .or_else(|| self.methods.get(name).and_then(|list| list.first()))
            .or_else(|| self.classes.get(name))
            .or_else(|| self.imports.get(name))
    }

    /// Names of every declared class
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Total number of indexed declarations
    pub fn len(&self) -> usize {
        self.variables.len()
            + self.parameters.len()
            + self.methods.values().map(Vec::len).sum::<usize>()
            + self.classes.len()
            + self.imports.len()
            + self.fields.len()
            + self.properties.len()
    }

    /// Whether nothing was indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Last `.`-separated segment of a possibly qualified class name
fn simple_class_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, FileAst, NodeKind};
    use crate::position::Span;

    fn sample_ast() -> FileAst {
        let mut builder = FileAst::builder();
        let module = builder.record(
            AstNode::new(NodeKind::Module, "greeter", Span::new(1, 1, 9, 2)),
            None,
        );
        builder.record(
            AstNode::new(NodeKind::Import, "java.util.List", Span::new(1, 1, 1, 22)),
            Some(module),
        );
        let class = builder.record(
            AstNode::new(NodeKind::ClassDecl, "demo.Greeter", Span::new(3, 1, 9, 2)),
            Some(module),
        );
        builder.record(
            AstNode::new(NodeKind::FieldDecl, "name", Span::new(4, 5, 4, 20))
                .with_owner("demo.Greeter"),
            Some(class),
        );
        for line in [5, 7] {
            builder.record(
                AstNode::new(NodeKind::MethodDecl, "greet", Span::new(line, 5, line, 30))
                    .with_owner("demo.Greeter"),
                Some(class),
            );
        }
        builder.record(
            AstNode::new(NodeKind::VariableDecl, "count", Span::new(8, 9, 8, 22)),
            Some(class),
        );
        // Synthetic declarations never land in the index.
        builder.record(
            AstNode::new(NodeKind::VariableDecl, "ghost", Span::synthetic()),
            Some(module),
        );
        builder.build()
    }

    #[test]
    fn test_build_recognizes_declaration_shapes() {
        let index = SymbolIndex::build(&sample_ast());

        assert!(index.lookup(SymbolKind::Variable, "count").is_some());
        assert!(index.lookup(SymbolKind::Field, "name").is_some());
        assert_eq!(index.methods_named("greet").len(), 2);
        assert!(index.lookup(SymbolKind::Import, "List").is_some());
        assert!(index.lookup(SymbolKind::Class, "Greeter").is_some());
    }

    #[test]
    fn test_class_indexed_without_package() {
        let index = SymbolIndex::build(&sample_ast());
        assert!(index.class_named("Greeter").is_some());
        assert!(index.class_named("demo.Greeter").is_some());
        assert!(index.class_named("Missing").is_none());
    }

    #[test]
    fn test_class_member_map() {
        let index = SymbolIndex::build(&sample_ast());
        let member = index.class_member("Greeter", "name").unwrap();
        assert_eq!(member.kind, NodeKind::FieldDecl);
        assert!(index.class_member("Greeter", "greet").is_some());
        assert!(index.class_member("Other", "name").is_none());
    }

    #[test]
    fn test_invalid_positions_skipped() {
        let index = SymbolIndex::build(&sample_ast());
        assert!(index.lookup(SymbolKind::Variable, "ghost").is_none());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let ast = sample_ast();
        assert_eq!(SymbolIndex::build(&ast), SymbolIndex::build(&ast));
    }

    #[test]
    fn test_lookup_any_scope_order() {
        let mut builder = FileAst::builder();
        let module = builder.record(
            AstNode::new(NodeKind::Module, "m", Span::new(1, 1, 3, 1)),
            None,
        );
        builder.record(
            AstNode::new(NodeKind::VariableDecl, "x", Span::new(1, 1, 1, 10)),
            Some(module),
        );
        builder.record(
            AstNode::new(NodeKind::MethodDecl, "x", Span::new(2, 1, 2, 10)),
            Some(module),
        );
        let index = SymbolIndex::build(&builder.build());

        // The variable shadows the method of the same name.
        assert_eq!(index.lookup_any("x").unwrap().kind, NodeKind::VariableDecl);
    }
}
