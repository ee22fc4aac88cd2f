//! XML parsing, path queries and request payloads.
//!
//! Every staging endpoint speaks XML. Responses are parsed into an
//! [`XmlDocument`] that remembers where it came from, so a query that finds
//! nothing can be reported against the endpoint that produced the document.

mod payload;
mod query;

use roxmltree::{Document, Node};

use crate::errors::StageError;

pub use payload::{cdata, promote_request_payload};
pub use query::{string_value, PathQuery};

/// A parsed response document.
pub struct XmlDocument<'input> {
    source: String,
    doc: Document<'input>,
}

impl<'input> XmlDocument<'input> {
    /// Parses `text`, which was fetched from `source`.
    pub fn parse(source: impl Into<String>, text: &'input str) -> Result<Self, StageError> {
        let source = source.into();
        match Document::parse(text) {
            Ok(doc) => Ok(Self { source, doc }),
            Err(err) => Err(StageError::Parse {
                url: source,
                source: err,
            }),
        }
    }

    /// The document's root element.
    #[must_use]
    pub fn root(&self) -> Node<'_, 'input> {
        self.doc.root_element()
    }

    /// Selects all nodes matching `expression` from the document root.
    pub fn select(&self, expression: &str) -> Result<Vec<Node<'_, 'input>>, StageError> {
        self.select_from(self.root(), expression)
    }

    /// Selects all nodes matching `expression` relative to `context`.
    pub fn select_from<'a>(
        &self,
        context: Node<'a, 'input>,
        expression: &str,
    ) -> Result<Vec<Node<'a, 'input>>, StageError> {
        Ok(PathQuery::compile(expression)?.select(context))
    }

    /// Untrimmed text of the first node matching `expression`.
    pub fn raw_text(&self, expression: &str) -> Result<Option<String>, StageError> {
        Ok(self.select(expression)?.into_iter().next().map(string_value))
    }

    /// Trimmed text of the first node matching `expression`.
    pub fn text(&self, expression: &str) -> Result<Option<String>, StageError> {
        self.text_from(self.root(), expression)
    }

    /// Trimmed text of the first node matching `expression` relative to `context`.
    pub fn text_from(
        &self,
        context: Node<'_, 'input>,
        expression: &str,
    ) -> Result<Option<String>, StageError> {
        Ok(self
            .select_from(context, expression)?
            .into_iter()
            .next()
            .map(|node| string_value(node).trim().to_string()))
    }

    /// Like [`XmlDocument::text`], but a missing node is an error.
    pub fn required_text(&self, expression: &str) -> Result<String, StageError> {
        self.required_text_from(self.root(), expression)
    }

    /// Like [`XmlDocument::text_from`], but a missing node is an error.
    pub fn required_text_from(
        &self,
        context: Node<'_, 'input>,
        expression: &str,
    ) -> Result<String, StageError> {
        self.text_from(context, expression)?
            .ok_or_else(|| self.missing(expression))
    }

    /// Reads a required `true`/`false` node.
    pub fn required_bool(&self, expression: &str) -> Result<bool, StageError> {
        let value = self.required_text(expression)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.invalid(expression, value)),
        }
    }

    /// Error for a query that matched nothing.
    #[must_use]
    pub fn missing(&self, expression: &str) -> StageError {
        StageError::MissingNode {
            url: self.source.clone(),
            path: expression.to_string(),
        }
    }

    /// Error for a node whose text could not be interpreted.
    #[must_use]
    pub fn invalid(&self, expression: &str, value: impl Into<String>) -> StageError {
        StageError::InvalidValue {
            url: self.source.clone(),
            path: expression.to_string(),
            value: value.into(),
        }
    }
}

impl std::fmt::Debug for XmlDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlDocument")
            .field("source", &self.source)
            .field("root", &self.root().tag_name().name())
            .finish()
    }
}
