//! A small owned element tree built with quick-xml.
//!
//! Names keep their namespace prefix as written (`us-gaap:Assets`); use
//! [`XmlElement::local_name`] to compare without it.

use crate::error::LedgerError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Direct text content, trimmed; segments split by child elements are joined with a space.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> XmlElement {
        let attributes = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                (key, value)
            })
            .collect();
        XmlElement {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// This element and all of its descendants, in document order.
    pub fn iter(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// First descendant (not this element) with the given local name.
    pub fn find(&self, local_name: &str) -> Option<&XmlElement> {
        self.iter().skip(1).find(|e| e.local_name() == local_name)
    }

    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    /// Render the tree as indented plain text: the tag, one `@name: value` line per
    /// attribute, then the text, with children nested two spaces deeper.
    pub fn to_indented_text(&self) -> String {
        let mut lines = Vec::new();
        self.write_lines(0, &mut lines);
        lines.join("\n")
    }

    fn write_lines(&self, level: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(level);
        lines.push(format!("{indent}{}", self.name));
        for (key, value) in &self.attributes {
            lines.push(format!("{indent}  @{key}: {value}"));
        }
        if !self.text.is_empty() {
            lines.push(format!("{indent}  {}", self.text));
        }
        for child in &self.children {
            child.write_lines(level + 1, lines);
        }
    }
}

/// Pre-order walk over an element tree.
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// Parse a document into its root element.
pub fn parse_tree(xml: &str) -> Result<XmlElement, LedgerError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(XmlElement::from_start(&e)),
            Event::Empty(e) => attach(&mut stack, &mut root, XmlElement::from_start(&e))?,
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| LedgerError::Xml("closing tag without an open element".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(LedgerError::Xml(format!("element <{}> is never closed", open.name)));
    }
    root.ok_or_else(|| LedgerError::Xml("document has no root element".into()))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), LedgerError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(LedgerError::Xml(format!(
            "second root element <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}
