//! 渲染后页面的 DOM 快照
//!
//! 页面内脚本把 `document.body` 按先序展平成带深度的节点列表，
//! 避免深层嵌套的 JSON 超出反序列化递归上限；Rust 侧再重建成树。

use serde::{Deserialize, Serialize};

/// 在页面中执行的快照脚本，返回 `{ nodes: [...] }`，`body` 不存在时 `nodes` 为空
pub const SNAPSHOT_SCRIPT: &str = r#"
(() => {
    const MAX_NODES = 50000;
    const nodes = [];
    if (!document.body) {
        return { nodes };
    }
    const stack = [[document.body, 0]];
    while (stack.length > 0 && nodes.length < MAX_NODES) {
        const [node, depth] = stack.pop();
        if (node.nodeType === Node.TEXT_NODE) {
            nodes.push({ kind: "text", depth, text: node.nodeValue || "" });
            continue;
        }
        if (node.nodeType !== Node.ELEMENT_NODE) {
            continue;
        }
        const cls = typeof node.className === "string"
            ? node.className
            : (node.getAttribute("class") || "");
        nodes.push({
            kind: "element",
            depth,
            tag: node.tagName.toLowerCase(),
            class: cls,
            id: node.id || ""
        });
        const children = node.childNodes;
        for (let i = children.length - 1; i >= 0; i--) {
            stack.push([children[i], depth + 1]);
        }
    }
    return { nodes };
})()
"#;

/// DOM 树节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Element {
        tag: String,
        class: String,
        id: String,
        children: Vec<DomNode>,
    },
    Text(String),
}

impl DomNode {
    pub fn element(tag: impl Into<String>, children: Vec<DomNode>) -> Self {
        DomNode::Element {
            tag: tag.into(),
            class: String::new(),
            id: String::new(),
            children,
        }
    }

    pub fn element_with(
        tag: impl Into<String>,
        class: impl Into<String>,
        id: impl Into<String>,
        children: Vec<DomNode>,
    ) -> Self {
        DomNode::Element {
            tag: tag.into(),
            class: class.into(),
            id: id.into(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        DomNode::Text(text.into())
    }
}

// 逐层释放子树，深层嵌套的页面不会在析构时递归爆栈
impl Drop for DomNode {
    fn drop(&mut self) {
        let mut pending = match self {
            DomNode::Element { children, .. } => std::mem::take(children),
            DomNode::Text(_) => return,
        };
        while let Some(mut node) = pending.pop() {
            if let DomNode::Element { children, .. } = &mut node {
                pending.append(children);
            }
        }
    }
}

/// 页面脚本返回的扁平快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomSnapshot {
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotNode {
    Element {
        depth: usize,
        tag: String,
        #[serde(default)]
        class: String,
        #[serde(default)]
        id: String,
    },
    Text {
        depth: usize,
        #[serde(default)]
        text: String,
    },
}

impl SnapshotNode {
    fn depth(&self) -> usize {
        match self {
            SnapshotNode::Element { depth, .. } | SnapshotNode::Text { depth, .. } => *depth,
        }
    }
}

impl DomSnapshot {
    /// 按深度重建树；第一个节点是根，且必须是元素。深度跳跃的节点挂到当前最深的祖先上。
    pub fn into_tree(self) -> Option<DomNode> {
        if !matches!(self.nodes.first(), Some(SnapshotNode::Element { .. })) {
            return None;
        }
        let mut stack: Vec<(usize, DomNode)> = Vec::new();

        for node in self.nodes {
            let depth = node.depth();
            if !stack.is_empty() && depth == 0 {
                // 只接受一个根
                break;
            }
            while stack.len() > 1 && stack.last().is_some_and(|(d, _)| *d >= depth) {
                close_top(&mut stack);
            }

            let dom = match node {
                SnapshotNode::Element { tag, class, id, .. } => DomNode::Element {
                    tag,
                    class,
                    id,
                    children: Vec::new(),
                },
                SnapshotNode::Text { text, .. } => DomNode::Text(text),
            };

            // 文本节点不能有子节点
            if matches!(stack.last(), Some((_, DomNode::Text(_)))) {
                close_top(&mut stack);
            }
            stack.push((depth, dom));
        }

        while stack.len() > 1 {
            close_top(&mut stack);
        }
        stack.pop().map(|(_, node)| node)
    }
}

fn close_top(stack: &mut Vec<(usize, DomNode)>) {
    if let Some((_, child)) = stack.pop() {
        if let Some((_, DomNode::Element { children, .. })) = stack.last_mut() {
            children.push(child);
        }
    }
}
