use super::dom::DomNode;
use super::rules::SkipRules;

/// 遍历是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// 显式的正文累加器，随遍历传递
#[derive(Debug)]
struct TextAccumulator {
    chunks: Vec<String>,
    chars: usize,
    budget: usize,
}

impl TextAccumulator {
    fn new(budget: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chars: 0,
            budget,
        }
    }

    fn is_full(&self) -> bool {
        self.chars >= self.budget
    }

    fn push(&mut self, raw: &str) -> Flow {
        let text = raw.trim();
        if !text.is_empty() {
            self.chars += text.chars().count();
            self.chunks.push(text.to_string());
        }
        if self.is_full() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn finish(self) -> Option<String> {
        if self.chunks.is_empty() {
            return None;
        }
        let joined = self.chunks.join(" ");
        if joined.chars().count() > self.budget {
            Some(joined.chars().take(self.budget).collect())
        } else {
            Some(joined)
        }
    }
}

/// 从 `body` 开始深度优先抽取可见正文，最多 `max_chars` 个字符
///
/// 根节点本身不受跳过规则约束，只对其后代判定。
/// 没有任何正文时返回 `None`。遍历用显式栈，嵌套深度不受线程栈大小限制。
pub fn extract_text(body: &DomNode, rules: &SkipRules, max_chars: usize) -> Option<String> {
    if max_chars == 0 {
        return None;
    }

    let mut acc = TextAccumulator::new(max_chars);
    let mut stack: Vec<std::slice::Iter<'_, DomNode>> = Vec::new();
    match body {
        DomNode::Element { children, .. } => stack.push(children.iter()),
        DomNode::Text(text) => {
            acc.push(text);
        }
    }

    while let Some(siblings) = stack.last_mut() {
        let Some(node) = siblings.next() else {
            stack.pop();
            continue;
        };
        if visit(node, rules, &mut acc, &mut stack) == Flow::Stop {
            break;
        }
    }
    acc.finish()
}

fn visit<'a>(
    node: &'a DomNode,
    rules: &SkipRules,
    acc: &mut TextAccumulator,
    stack: &mut Vec<std::slice::Iter<'a, DomNode>>,
) -> Flow {
    match node {
        DomNode::Text(text) => acc.push(text),
        DomNode::Element {
            tag,
            class,
            id,
            children,
        } => {
            if !rules.skips_tag(tag) && !rules.skips_marker(class, id) {
                stack.push(children.iter());
            }
            Flow::Continue
        }
    }
}
