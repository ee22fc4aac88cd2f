//! A small path-query language over parsed XML documents.
//!
//! The supported grammar is the subset of XPath the staging API needs:
//!
//! ```text
//! query     := ["/" | "//"] step (("/" | "//") step)*
//! step      := name predicate*
//! name      := identifier | "*"
//! predicate := "[" ( integer | "last()" | identifier | identifier "=" literal ) "]"
//! literal   := "'" chars "'" | '"' chars '"'
//! ```
//!
//! A leading `/` anchors the query at the document root, `//` selects
//! matching elements at any depth. Element names are matched on their local
//! name. Equality predicates compare the whitespace-trimmed text of a child
//! element.

use roxmltree::Node;

use crate::errors::StageError;

/// How a step relates to the nodes selected by the previous step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    /// 1-based position within the step's candidates.
    Position(usize),
    Last,
    HasChild(String),
    ChildEquals(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// `None` matches any element.
    name: Option<String>,
    predicates: Vec<Predicate>,
}

/// A compiled path query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    absolute: bool,
    steps: Vec<Step>,
}

impl PathQuery {
    /// Compiles `expression`.
    pub fn compile(expression: &str) -> Result<Self, StageError> {
        Parser::new(expression).parse()
    }

    /// Evaluates the query with `context` as the starting node.
    ///
    /// Absolute queries ignore the context and start from its document root.
    /// Results are in document order without duplicates.
    pub fn select<'a, 'input>(&self, context: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        let start = if self.absolute {
            context.document().root()
        } else {
            context
        };

        let mut current = vec![start];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in &current {
                match step.axis {
                    Axis::Child => next.extend(step.apply(*node)),
                    Axis::Descendant => {
                        for parent in node.descendants().filter(|n| n.is_element() || n.is_root()) {
                            next.extend(step.apply(parent));
                        }
                    }
                }
            }
            next.sort_by_key(|n| n.range().start);
            next.dedup_by(|a, b| a.id() == b.id());
            current = next;
        }
        current
    }

    /// Returns the first node selected from `context`, if any.
    pub fn first<'a, 'input>(&self, context: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
        self.select(context).into_iter().next()
    }
}

impl Step {
    fn matches(&self, node: &Node<'_, '_>) -> bool {
        node.is_element()
            && self
                .name
                .as_deref()
                .map_or(true, |name| node.tag_name().name() == name)
    }

    fn apply<'a, 'input>(&self, parent: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        let mut candidates: Vec<_> = parent.children().filter(|c| self.matches(c)).collect();
        for predicate in &self.predicates {
            candidates = match predicate {
                Predicate::Position(n) => candidates.get(n - 1).copied().into_iter().collect(),
                Predicate::Last => candidates.last().copied().into_iter().collect(),
                Predicate::HasChild(child) => candidates
                    .into_iter()
                    .filter(|c| !child_elements(*c, child).is_empty())
                    .collect(),
                Predicate::ChildEquals(child, literal) => candidates
                    .into_iter()
                    .filter(|c| {
                        child_elements(*c, child)
                            .into_iter()
                            .any(|e| string_value(e).trim() == literal)
                    })
                    .collect(),
            };
        }
        candidates
    }
}

fn child_elements<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().name() == name)
        .collect()
}

/// The concatenation of all text below `node`, in document order.
#[must_use]
pub fn string_value(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

struct Parser<'e> {
    expression: &'e str,
    chars: Vec<char>,
    pos: usize,
}

impl<'e> Parser<'e> {
    fn new(expression: &'e str) -> Self {
        Self {
            expression,
            chars: expression.trim().chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> StageError {
        StageError::InvalidQuery {
            expression: self.expression.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes `/` or `//` and returns the corresponding axis.
    fn separator(&mut self) -> Option<Axis> {
        if !self.eat('/') {
            return None;
        }
        if self.eat('/') {
            Some(Axis::Descendant)
        } else {
            Some(Axis::Child)
        }
    }

    fn parse(mut self) -> Result<PathQuery, StageError> {
        if self.chars.is_empty() {
            return Err(self.error("empty expression"));
        }

        let (absolute, mut axis) = match self.separator() {
            Some(axis) => (true, axis),
            None => (false, Axis::Child),
        };

        let mut steps = Vec::new();
        loop {
            steps.push(self.step(axis)?);
            if self.pos == self.chars.len() {
                break;
            }
            axis = self
                .separator()
                .ok_or_else(|| self.error(format!("unexpected character at {}", self.pos)))?;
            if self.pos == self.chars.len() {
                return Err(self.error("trailing separator"));
            }
        }

        Ok(PathQuery {
            absolute,
            steps,
        })
    }

    fn step(&mut self, axis: Axis) -> Result<Step, StageError> {
        let name = if self.eat('*') {
            None
        } else {
            Some(self.identifier()?)
        };

        let mut predicates = Vec::new();
        while self.eat('[') {
            predicates.push(self.predicate()?);
        }

        Ok(Step {
            axis,
            name,
            predicates,
        })
    }

    fn identifier(&mut self) -> Result<String, StageError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error(format!("expected a name at {start}")));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn predicate(&mut self) -> Result<Predicate, StageError> {
        self.skip_whitespace();
        let predicate = match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                match digits.parse::<usize>() {
                    Ok(n) if n > 0 => Predicate::Position(n),
                    _ => return Err(self.error(format!("invalid position '{digits}'"))),
                }
            }
            Some(_) => {
                let name = self.identifier()?;
                self.skip_whitespace();
                if name == "last" && self.eat('(') {
                    if !self.eat(')') {
                        return Err(self.error("expected ')' after 'last('"));
                    }
                    Predicate::Last
                } else if self.eat('=') {
                    self.skip_whitespace();
                    let literal = self.literal()?;
                    Predicate::ChildEquals(name, literal)
                } else {
                    Predicate::HasChild(name)
                }
            }
            None => return Err(self.error("unterminated predicate")),
        };
        self.skip_whitespace();
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(predicate)
    }

    fn literal(&mut self) -> Result<String, StageError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted literal")),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let literal = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(literal);
            }
            self.pos += 1;
        }
        Err(self.error("unterminated literal"))
    }
}
