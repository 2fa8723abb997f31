//! Namespace-aware element tree for the operator's XML reports.
//!
//! Report documents are small (a few hundred elements), so they are read
//! fully into memory and queried with [`NodePath`] descriptors.

use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("non UTF-8 name or namespace in document")]
    InvalidUtf8,
    #[error("unknown namespace prefix in element {0}")]
    UnknownPrefix(String),
    #[error("unbalanced closing tag")]
    UnbalancedEnd,
    #[error("document ended with {0} unclosed element(s)")]
    Unclosed(usize),
    #[error("document has no root element")]
    EmptyDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub local_name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

/// Location of a node: anchored anywhere in the document at the first
/// segment, then descending through direct children for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePath {
    pub namespace: &'static str,
    pub segments: &'static [&'static str],
}

impl NodePath {
    /// Segments joined with `/`, for messages.
    pub fn describe(&self) -> String {
        self.segments.join("/")
    }
}

impl XmlElement {
    fn new(namespace: Option<String>, local_name: String) -> Self {
        Self {
            namespace,
            local_name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Self and every nested element, in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            out.push(element);
            stack.extend(element.children.iter().rev());
        }
        out
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |child| child.is(namespace, local_name))
    }

    pub fn child_named(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|child| child.is(namespace, local_name))
    }

    pub fn find_all(&self, path: &NodePath) -> Vec<&XmlElement> {
        let Some((first, rest)) = path.segments.split_first() else {
            return Vec::new();
        };

        let mut current: Vec<&XmlElement> = self
            .descendants()
            .into_iter()
            .filter(|element| element.is(path.namespace, first))
            .collect();
        for segment in rest {
            current = current
                .into_iter()
                .flat_map(|element| element.children_named(path.namespace, segment))
                .collect();
        }
        current
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        !self.find_all(path).is_empty()
    }
}

pub fn read_document(path: &Path) -> Result<XmlElement, XmlError> {
    let source = fs::read_to_string(path)?;
    parse_document(&source)
}

pub fn parse_document(source: &str) -> Result<XmlElement, XmlError> {
    let mut reader = NsReader::from_str(source);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(start)) => {
                let name = utf8(start.local_name().as_ref())?;
                stack.push(XmlElement::new(resolve_namespace(ns, &name)?, name));
            }
            (ns, Event::Empty(start)) => {
                let name = utf8(start.local_name().as_ref())?;
                let element = XmlElement::new(resolve_namespace(ns, &name)?, name);
                attach(&mut stack, &mut root, element);
            }
            (_, Event::Text(text)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&text.unescape()?);
                }
            }
            (_, Event::CData(data)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&utf8(&data.into_inner())?);
                }
            }
            (_, Event::End(_)) => {
                let element = stack.pop().ok_or(XmlError::UnbalancedEnd)?;
                attach(&mut stack, &mut root, element);
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Unclosed(stack.len()));
    }
    root.ok_or(XmlError::EmptyDocument)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn resolve_namespace(ns: ResolveResult<'_>, element: &str) -> Result<Option<String>, XmlError> {
    match ns {
        ResolveResult::Bound(namespace) => Ok(Some(utf8(namespace.as_ref())?)),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(_) => Err(XmlError::UnknownPrefix(element.to_string())),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| XmlError::InvalidUtf8)
}
