use crate::class::ClassSet;
use crate::flags::CompileFlags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Empty,
    Literal {
        ch: char,
        caseless: bool,
    },
    Class(ClassSet),
    /// `.`; with `dotall` it also matches newlines.
    Dot {
        dotall: bool,
    },
    /// `\N`: any character except a newline, whatever the dotall setting.
    NotNewline,
    /// `\R`
    LineBreak,
    Concat(Vec<Node>),
    Alt(Vec<Node>),
    Repeat {
        node: Box<Node>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        possessive: bool,
    },
    Group {
        node: Box<Node>,
        kind: GroupKind,
    },
    Anchor(Anchor),
    BackRef {
        target: BackRefTarget,
        caseless: bool,
    },
    Look {
        node: Box<Node>,
        behind: bool,
        negated: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    Capture { index: usize, name: Option<String> },
    NonCapture,
    Atomic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackRefTarget {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `^`
    Caret { multiline: bool },
    /// `$`
    Dollar { multiline: bool, end_only: bool },
    /// `\A`
    StartText,
    /// `\z`
    EndText,
    /// `\Z`
    EndTextOptNewline,
    /// `\G`
    StartOfMatch,
    /// `\b` and `\B`
    WordBoundary { negated: bool, unicode: bool },
}

/// A parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub root: Node,
    pub capture_count: usize,
    /// Flags in effect after leading `(*VERB)` items.
    pub flags: CompileFlags,
    /// An inline `(?J)` appeared somewhere.
    pub jchanged: bool,
}

impl Node {
    pub fn concat(mut nodes: Vec<Node>) -> Node {
        match nodes.len() {
            0 => Node::Empty,
            1 => nodes.pop().unwrap_or(Node::Empty),
            _ => Node::Concat(nodes),
        }
    }

    pub fn alt(mut branches: Vec<Node>) -> Node {
        if branches.len() == 1 {
            branches.pop().unwrap_or(Node::Empty)
        } else {
            Node::Alt(branches)
        }
    }

    /// Shortest input this node can consume.
    pub fn min_width(&self) -> usize {
        match self {
            Node::Empty | Node::Anchor(_) | Node::Look { .. } | Node::BackRef { .. } => 0,
            Node::Literal { .. }
            | Node::Class(_)
            | Node::Dot { .. }
            | Node::NotNewline
            | Node::LineBreak => 1,
            Node::Concat(nodes) => nodes
                .iter()
                .fold(0usize, |acc, n| acc.saturating_add(n.min_width())),
            Node::Alt(branches) => branches.iter().map(Node::min_width).min().unwrap_or(0),
            Node::Repeat { node, min, .. } => node.min_width().saturating_mul(*min as usize),
            Node::Group { node, .. } => node.min_width(),
        }
    }

    /// Exact width, when every way of matching consumes the same number of
    /// characters.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Node::Empty | Node::Anchor(_) | Node::Look { .. } => Some(0),
            Node::Literal { .. } | Node::Class(_) | Node::Dot { .. } | Node::NotNewline => {
                Some(1)
            }
            Node::LineBreak | Node::BackRef { .. } => None,
            Node::Concat(nodes) => nodes
                .iter()
                .try_fold(0usize, |acc, n| Some(acc + n.fixed_width()?)),
            Node::Alt(branches) => {
                let mut widths = branches.iter().map(Node::fixed_width);
                let first = widths.next()??;
                widths.all(|w| w == Some(first)).then_some(first)
            }
            Node::Repeat { node, min, max, .. } => {
                if Some(*min) == *max {
                    Some(node.fixed_width()? * *min as usize)
                } else if node.fixed_width()? == 0 {
                    Some(0)
                } else {
                    None
                }
            }
            Node::Group { node, .. } => node.fixed_width(),
        }
    }

    /// Every child, in source order.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Concat(nodes) | Node::Alt(nodes) => nodes,
            Node::Repeat { node, .. } | Node::Group { node, .. } | Node::Look { node, .. } => {
                std::slice::from_ref(node.as_ref())
            }
            _ => &[],
        }
    }
}
