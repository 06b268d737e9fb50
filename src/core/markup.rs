//! Owned markup tree.
//!
//! Documents are parsed with `quick-xml` into a flat arena of [`Element`]s.
//! Each element gets a [`NodeId`] when it is parsed; the id is just its
//! index in the arena, so anything that needs to attach data to a node
//! can key an [`Annotations`] map by it.

use std::fmt;

use fxhash::FxHashMap;
use msbuild_expr::SourceSpan;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::utils::error::MarkupError;

/// Stable index of an element within its [`MarkupDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Unescaped value.
    pub value: String,
    pub name_span: SourceSpan,
    /// Span of the raw value between the quotes.
    pub value_span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Unescaped text directly inside this element.
    pub text: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// The start tag, `<Name ...>` or `<Name ... />`.
    pub start_tag: SourceSpan,
    /// From the start tag to the end of the closing tag.
    pub span: SourceSpan,
    /// Raw content between the tags, for elements without child elements.
    pub value_span: Option<SourceSpan>,
    pub self_closing: bool,
}

impl Element {
    /// Look up an attribute by name, ignoring ASCII case.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|a| a.value.as_str())
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupDocument {
    elements: Vec<Element>,
    root: Option<NodeId>,
}

impl MarkupDocument {
    /// A document with no elements, used in place of one that failed to parse.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, MarkupError> {
        let mut reader = Reader::from_str(text);
        let mut doc = MarkupDocument::default();
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            let start = reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    return Err(MarkupError::new(
                        err.to_string(),
                        reader.buffer_position() as usize,
                    ))
                }
            };
            let end = reader.buffer_position() as usize;

            match event {
                Event::Start(tag) => {
                    let id = doc.open(&tag, text, SourceSpan::new(start, end), stack.last().copied())?;
                    stack.push(id);
                }
                Event::Empty(tag) => {
                    let id = doc.open(&tag, text, SourceSpan::new(start, end), stack.last().copied())?;
                    let element = &mut doc.elements[id.0];
                    element.self_closing = true;
                }
                Event::End(_) => {
                    if let Some(id) = stack.pop() {
                        let element = &mut doc.elements[id.0];
                        element.span = SourceSpan::new(element.start_tag.start, end);
                        if element.children.is_empty() {
                            element.value_span = Some(SourceSpan::new(element.start_tag.end, start));
                        }
                    }
                }
                Event::Text(raw) => {
                    if let Some(&id) = stack.last() {
                        let value = raw
                            .unescape()
                            .map_err(|e| MarkupError::new(e.to_string(), start))?;
                        doc.elements[id.0].text.push_str(&value);
                    }
                }
                Event::CData(raw) => {
                    if let Some(&id) = stack.last() {
                        let value = String::from_utf8_lossy(&raw.into_inner()).into_owned();
                        doc.elements[id.0].text.push_str(&value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&open) = stack.last() {
            let element = &doc.elements[open.0];
            return Err(MarkupError::new(
                format!("element '{}' is not closed", element.name),
                element.start_tag.start,
            ));
        }
        if doc.root.is_none() {
            return Err(MarkupError::new("document has no root element", text.len()));
        }
        Ok(doc)
    }

    fn open(
        &mut self,
        tag: &BytesStart<'_>,
        text: &str,
        start_tag: SourceSpan,
        parent: Option<NodeId>,
    ) -> Result<NodeId, MarkupError> {
        let id = NodeId(self.elements.len());
        match parent {
            Some(parent) => self.elements[parent.0].children.push(id),
            None if self.root.is_some() => {
                return Err(MarkupError::new("multiple root elements", start_tag.start));
            }
            None => self.root = Some(id),
        }

        let raw = text.get(start_tag.start..start_tag.end).unwrap_or("");
        let spans = scan_attribute_spans(raw, start_tag.start);
        let mut attributes = Vec::new();
        for (index, attr) in tag.attributes().enumerate() {
            let attr = attr.map_err(|e| MarkupError::new(e.to_string(), start_tag.start))?;
            let value = attr
                .unescape_value()
                .map_err(|e| MarkupError::new(e.to_string(), start_tag.start))?;
            let (name_span, value_span) = spans.get(index).copied().unwrap_or((start_tag, start_tag));
            attributes.push(Attribute {
                name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                value: value.into_owned(),
                name_span,
                value_span,
            });
        }

        self.elements.push(Element {
            name: String::from_utf8_lossy(tag.name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            parent,
            children: Vec::new(),
            start_tag,
            span: start_tag,
            value_span: None,
            self_closing: false,
        });
        Ok(id)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_element(&self) -> Option<&Element> {
        self.root.map(|id| &self.elements[id.0])
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Every element with its id, in document order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Element)> {
        self.elements.iter().enumerate().map(|(i, e)| (NodeId(i), e))
    }

    /// Child elements of `id` with the given name.
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = (NodeId, &'a Element)> + 'a {
        self.get(id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&child| {
                let element = self.get(child)?;
                element.is_named(name).then_some((child, element))
            })
    }
}

/// Side data attached to elements by id.
#[derive(Debug, Clone)]
pub struct Annotations<T> {
    values: FxHashMap<NodeId, T>,
}

impl<T> Default for Annotations<T> {
    fn default() -> Self {
        Self {
            values: FxHashMap::default(),
        }
    }
}

impl<T> Annotations<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `value` to `id`, returning any previous annotation.
    pub fn insert(&mut self, id: NodeId, value: T) -> Option<T> {
        self.values.insert(id, value)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.values.get(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Find the name and value spans of each attribute in a raw start tag.
/// `base` is the tag's offset in the document.
fn scan_attribute_spans(raw: &str, base: usize) -> Vec<(SourceSpan, SourceSpan)> {
    let bytes = raw.as_bytes();
    let mut spans = Vec::new();
    let mut i = 1;
    while i < bytes.len() && !is_space(bytes[i]) && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }

    loop {
        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'>' || bytes[i] == b'/' {
            break;
        }

        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !is_space(bytes[i]) && bytes[i] != b'>' {
            i += 1;
        }
        let name_end = i;
        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            break;
        }
        i += 1;
        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        let Some(&quote) = bytes.get(i) else { break };
        if quote != b'"' && quote != b'\'' {
            break;
        }
        let value_start = i + 1;
        let Some(len) = bytes[value_start..].iter().position(|&b| b == quote) else {
            break;
        };
        let value_end = value_start + len;
        spans.push((
            SourceSpan::new(base + name_start, base + name_end),
            SourceSpan::new(base + value_start, base + value_end),
        ));
        i = value_end + 1;
    }
    spans
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}
