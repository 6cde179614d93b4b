use serde::{Deserialize, Serialize};

use crate::ast::{Ast, Metadata, NodeId, NodeKind};
use crate::error::AstError;
use crate::span::Span;

/// Persisted form of a node subtree. Parent links, type references and any
/// builder context are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeSnapshot>,
}

impl Ast {
    pub fn to_snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = &self[id];
        NodeSnapshot {
            kind: node.kind,
            image: node.image.clone(),
            span: node.span,
            comment: node.comment.clone(),
            metadata: node.metadata.clone(),
            nodes: node.children.iter().map(|c| self.to_snapshot(*c)).collect(),
        }
    }

    /// Rebuilds a snapshot into a fresh arena. Every restored child is
    /// re-parented to its restored owner.
    pub fn from_snapshot(snapshot: &NodeSnapshot) -> Ast {
        let mut ast = Ast::new();
        let root = ast.restore(snapshot);
        ast.set_root(root);
        ast
    }

    /// Restores `snapshot` into this arena without attaching it anywhere.
    pub fn restore(&mut self, snapshot: &NodeSnapshot) -> NodeId {
        let id = self.alloc(snapshot.kind, snapshot.image.clone(), snapshot.span);
        {
            let node = self.node_mut(id);
            node.comment = snapshot.comment.clone();
            node.metadata = snapshot.metadata.clone();
        }
        for child in &snapshot.nodes {
            let child_id = self.restore(child);
            self.add_child(id, child_id);
        }
        id
    }

    pub fn to_json(&self, id: NodeId) -> Result<String, AstError> {
        serde_json::to_string(&self.to_snapshot(id)).map_err(|e| AstError::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Ast, AstError> {
        let snapshot: NodeSnapshot = serde_json::from_str(json).map_err(|e| AstError::Snapshot(e.to_string()))?;
        Ok(Ast::from_snapshot(&snapshot))
    }
}
