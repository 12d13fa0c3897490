//! Cursor over a previous parse tree.
//!
//! During an incremental reparse the driver walks the old tree in step with
//! the input, offering unchanged subtrees back to the parser wholesale. The
//! cursor is an explicit descent stack of (tree, child index, byte offset)
//! entries; advancing past a subtree threads the last external-scanner
//! token so reuse checks can compare scanner states.

use crate::tree::Tree;

#[derive(Debug, Clone)]
struct ReusableEntry {
    tree: Tree,
    child_index: usize,
    byte_offset: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ReusableNode {
    stack: Vec<ReusableEntry>,
    last_external_token: Option<Tree>,
}

impl ReusableNode {
    pub fn new(tree: Option<Tree>) -> Self {
        Self {
            stack: tree
                .map(|tree| {
                    vec![ReusableEntry {
                        tree,
                        child_index: 0,
                        byte_offset: 0,
                    }]
                })
                .unwrap_or_default(),
            last_external_token: None,
        }
    }

    /// The subtree the cursor currently offers, if any remain.
    pub fn tree(&self) -> Option<&Tree> {
        self.stack.last().map(|entry| &entry.tree)
    }

    /// Byte position where the current subtree (including its padding)
    /// begins.
    pub fn byte_index(&self) -> u32 {
        self.stack.last().map_or(0, |entry| entry.byte_offset)
    }

    pub fn last_external_token(&self) -> Option<&Tree> {
        self.last_external_token.as_ref()
    }

    /// Descend into the current subtree, making its leftmost child the
    /// current offering. Returns `false` at a leaf.
    pub fn breakdown(&mut self) -> bool {
        let Some(top) = self.stack.last() else {
            return false;
        };
        let Some(child) = top.tree.children().first().cloned() else {
            return false;
        };
        let byte_offset = top.byte_offset;
        self.stack.push(ReusableEntry {
            tree: child,
            child_index: 0,
            byte_offset,
        });
        true
    }

    /// Advance past the current subtree to the next one in traversal
    /// order.
    pub fn pop(&mut self) {
        while let Some(entry) = self.stack.pop() {
            if entry.tree.has_external_tokens() {
                self.last_external_token = entry.tree.last_external_token();
            }
            let Some(parent) = self.stack.last() else {
                return;
            };
            let next_index = entry.child_index + 1;
            if let Some(sibling) = parent.tree.children().get(next_index).cloned() {
                let byte_offset = entry.byte_offset + entry.tree.total_bytes();
                self.stack.push(ReusableEntry {
                    tree: sibling,
                    child_index: next_index,
                    byte_offset,
                });
                return;
            }
        }
    }

    /// A cursor positioned just past the current subtree's leftmost leaf.
    pub fn after_leaf(&self) -> Self {
        let mut cursor = self.clone();
        while cursor.breakdown() {}
        cursor.pop();
        cursor
    }
}
