pub mod kind;
pub mod locator;
pub mod sexpr;
pub mod snapshot;
pub mod visitor;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::builder::modifiers::Modifiers;
use crate::builder::reference::TypeRef;
use crate::error::AstError;
use crate::span::Span;

pub use kind::{CastKind, NodeCategory, NodeKind, NodeMatcher};

/// Stable index of a node inside its [`Ast`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

bitflags! {
    /// Boolean properties of concrete node variants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct NodeFlags: u16 {
        /// `&$x` in array elements, parameters, foreach values, `=&`.
        const BY_REF = 1 << 0;
        /// `default:` switch label.
        const DEFAULT = 1 << 1;
        /// `static function`, `static fn`, static closures.
        const STATIC = 1 << 2;
        const VARIADIC = 1 << 3;
        /// Block written with `:` ... `endXXX;`.
        const ALTERNATIVE = 1 << 4;
        const NULLABLE = 1 << 5;
        /// `include_once` / `require_once`.
        const ONCE = 1 << 6;
        /// `fn() =>` arrow function.
        const ARROW = 1 << 7;
        /// `[...]` array/list syntax.
        const SHORT_SYNTAX = 1 << 8;
        /// Function or method returning by reference.
        const RETURNS_REF = 1 << 9;
        /// `yield from`.
        const DELEGATE = 1 << 10;
    }
}

/// Persisted per-node data beyond kind, image, span and comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "NodeFlags::is_empty")]
    pub flags: NodeFlags,
    #[serde(default, skip_serializing_if = "Modifiers::is_empty")]
    pub modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub image: String,
    pub comment: Option<String>,
    pub span: Span,
    pub metadata: Metadata,
    /// Symbolic type reference shared with the declaring entity. Never
    /// persisted; restored snapshots carry `None`.
    pub reference: Option<Arc<TypeRef>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, image: String, span: Span) -> Self {
        Self {
            kind,
            image,
            comment: None,
            span,
            metadata: Metadata::default(),
            reference: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_flag(&self, flag: NodeFlags) -> bool {
        self.metadata.flags.contains(flag)
    }

    pub fn is_by_reference(&self) -> bool {
        self.has_flag(NodeFlags::BY_REF)
    }

    pub fn is_default(&self) -> bool {
        self.has_flag(NodeFlags::DEFAULT)
    }

    pub fn is_static(&self) -> bool {
        self.has_flag(NodeFlags::STATIC) || self.metadata.modifiers.contains(Modifiers::STATIC)
    }

    pub fn is_variadic(&self) -> bool {
        self.has_flag(NodeFlags::VARIADIC)
    }

    pub fn is_alternative(&self) -> bool {
        self.has_flag(NodeFlags::ALTERNATIVE)
    }

    pub fn is_private(&self) -> bool {
        self.metadata.modifiers.contains(Modifiers::PRIVATE)
    }

    pub fn is_protected(&self) -> bool {
        self.metadata.modifiers.contains(Modifiers::PROTECTED)
    }

    pub fn is_public(&self) -> bool {
        self.metadata.modifiers.contains(Modifiers::PUBLIC)
    }

    /// Cast classification, only meaningful for `CastExpression` nodes.
    pub fn cast_kind(&self) -> Option<CastKind> {
        match self.kind {
            NodeKind::CastExpression => CastKind::from_image(&self.image),
            _ => None,
        }
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.metadata.extra.get(key).map(String::as_str)
    }
}

/// Arena holding every node of one compilation unit. Parent links are plain
/// indexes and are rewritten by every structural mutation.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    file: Option<String>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(file: impl Into<String>) -> Self {
        Self { file: Some(file.into()), ..Self::default() }
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn alloc(&mut self, kind: NodeKind, image: impl Into<String>, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind, image.into(), span));
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old) = self.nodes[child.index()].parent.take() {
            self.nodes[old.index()].children.retain(|c| *c != child);
        }
    }

    /// Appends `child` to `parent`, moving it away from any previous owner.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        self.detach(child);
        self.nodes[parent.index()].children.push(child);
        self.nodes[child.index()].parent = Some(parent);
        child
    }

    /// Inserts `child` at position 0; existing children shift right.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        self.detach(child);
        self.nodes[parent.index()].children.insert(0, child);
        self.nodes[child.index()].parent = Some(parent);
        child
    }

    /// Puts `new` in the slot `old` occupies under `parent`; `old` ends up
    /// detached.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<(), AstError> {
        self.detach(new);
        let children = &mut self.nodes[parent.index()].children;
        let index = children.iter().position(|c| *c == old).ok_or(AstError::UnknownNode(old))?;
        children[index] = new;
        self.nodes[old.index()].parent = None;
        self.nodes[new.index()].parent = Some(parent);
        Ok(())
    }

    pub fn get_child(&self, id: NodeId, index: usize) -> Result<NodeId, AstError> {
        let node = self.get(id).ok_or(AstError::UnknownNode(id))?;
        node.children
            .get(index)
            .copied()
            .ok_or(AstError::ChildOutOfRange { index, count: node.children.len() })
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self[id].kind
    }

    pub fn image(&self, id: NodeId) -> &str {
        &self[id].image
    }

    pub fn span(&self, id: NodeId) -> Span {
        self[id].span
    }

    /// Depth-first pre-order search below `id` for the first node `matcher`
    /// accepts. Index and member-prefix nodes look at their direct children
    /// before descending.
    pub fn first_child_of_type<M: NodeMatcher + ?Sized>(&self, id: NodeId, matcher: &M) -> Option<NodeId> {
        let node = &self[id];
        if matches!(node.kind, NodeKind::ArrayIndexExpression | NodeKind::MemberPrimaryPrefix) {
            if let Some(direct) = node.children.iter().copied().find(|c| matcher.matches(self[*c].kind)) {
                return Some(direct);
            }
        }

        for &child in &node.children {
            if matcher.matches(self[child].kind) {
                return Some(child);
            }
            if let Some(found) = self.first_child_of_type(child, matcher) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant of `id` (excluding `id`) accepted by `matcher`, in
    /// pre-order.
    pub fn find_children_of_type<M: NodeMatcher + ?Sized>(&self, id: NodeId, matcher: &M) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_children_of_type(id, matcher, &mut found);
        found
    }

    /// Like [`Ast::find_children_of_type`], with `id` itself first when it
    /// matches.
    pub fn find_self_and_children_of_type<M: NodeMatcher + ?Sized>(&self, id: NodeId, matcher: &M) -> Vec<NodeId> {
        let mut found = Vec::new();
        if matcher.matches(self[id].kind) {
            found.push(id);
        }
        self.collect_children_of_type(id, matcher, &mut found);
        found
    }

    fn collect_children_of_type<M: NodeMatcher + ?Sized>(&self, id: NodeId, matcher: &M, found: &mut Vec<NodeId>) {
        for &child in &self[id].children {
            if matcher.matches(self[child].kind) {
                found.push(child);
            }
            self.collect_children_of_type(child, matcher, found);
        }
    }

    /// All ancestors of `id` accepted by `matcher`, nearest first.
    pub fn parents_of_type<M: NodeMatcher + ?Sized>(&self, id: NodeId, matcher: &M) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut current = self[id].parent;
        while let Some(parent) = current {
            if matcher.matches(self[parent].kind) {
                found.push(parent);
            }
            current = self[parent].parent;
        }
        found
    }

    pub fn parent_of_type<M: NodeMatcher + ?Sized>(&self, id: NodeId, matcher: &M) -> Option<NodeId> {
        let mut current = self[id].parent;
        while let Some(parent) = current {
            if matcher.matches(self[parent].kind) {
                return Some(parent);
            }
            current = self[parent].parent;
        }
        None
    }

    /// Pre-order walk of `id` and its descendants.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self[next].children.iter().rev().copied());
        }
        out
    }

    /// True when every node below `id` lies inside its parent's span and every
    /// child points back at the node holding it.
    pub fn is_well_formed(&self, id: NodeId) -> bool {
        let node = &self[id];
        node.children.iter().all(|&child| {
            let child_node = &self[child];
            child_node.parent == Some(id) && node.span.encloses(&child_node.span) && self.is_well_formed(child)
        })
    }

    /// Copies the subtree rooted at `id` of `other` into this arena and returns
    /// the new root. The copy has no parent.
    pub fn import(&mut self, other: &Ast, id: NodeId) -> NodeId {
        let source = &other[id];
        let copy = self.alloc(source.kind, source.image.clone(), source.span);
        {
            let node = self.node_mut(copy);
            node.comment = source.comment.clone();
            node.metadata = source.metadata.clone();
            node.reference = source.reference.clone();
        }
        for &child in &source.children {
            let child_copy = self.import(other, child);
            self.add_child(copy, child_copy);
        }
        copy
    }
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}
