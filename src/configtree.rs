//! Read-only configuration tree parsed from XML scene text.
//!
//! Scene files are plain XML where element tags may carry a namespace-style
//! prefix that selects a kind, e.g. `<model:physical>`, `<body:box>`,
//! `<joint:hinge>`, `<controller:pose_sensor>`. A [`ConfigNode`] keeps the
//! prefix and local name apart so loaders can filter children by prefix and
//! dispatch on the local name.
//!
//! Values are resolved by key, first as an attribute and then as the text of
//! an un-prefixed child element:
//!
//! ```xml
//! <model:physical name="robot" xyz="0 0 1">
//!   <rpy>0 0 90</rpy>
//! </model:physical>
//! ```

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, SimError};
use crate::params::value::ParamValue;

/// One element of a parsed scene description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    prefix: Option<String>,
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<ConfigNode>,
    text: String,
}

impl ConfigNode {
    /// Create an empty node from a tag such as `joint:hinge` or `attach`.
    pub fn new(tag: &str) -> Self {
        let (prefix, name) = match tag.split_once(':') {
            Some((prefix, name)) => (Some(prefix.to_string()), name.to_string()),
            None => (None, tag.to_string()),
        };
        Self {
            prefix,
            name,
            ..Self::default()
        }
    }

    /// Builder: add an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder: append a child node.
    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: set the element text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Parse XML text and return its root element.
    pub fn parse(xml: &str) -> Result<ConfigNode> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<ConfigNode> = Vec::new();
        let mut root: Option<ConfigNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(Self::from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let node = Self::from_start(e)?;
                    Self::close(&mut stack, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| SimError::Xml("unbalanced closing tag".to_string()))?;
                    Self::close(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(ref t)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t.unescape().map_err(|e| SimError::Xml(e.to_string()))?;
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(SimError::Xml(format!(
                        "at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(SimError::Xml(format!("unclosed element <{}>", open.tag())));
        }
        root.ok_or_else(|| SimError::Xml("document has no root element".to_string()))
    }

    fn from_start(e: &BytesStart) -> Result<ConfigNode> {
        let tag = String::from_utf8(e.name().as_ref().to_vec())
            .map_err(|err| SimError::Xml(err.to_string()))?;
        let mut node = ConfigNode::new(&tag);
        for attr in e.attributes() {
            let attr = attr.map_err(|err| SimError::Xml(err.to_string()))?;
            let key = String::from_utf8(attr.key.as_ref().to_vec())
                .map_err(|err| SimError::Xml(err.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|err| SimError::Xml(err.to_string()))?
                .into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    fn close(
        stack: &mut [ConfigNode],
        root: &mut Option<ConfigNode>,
        node: ConfigNode,
    ) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_none() => *root = Some(node),
            None => {
                return Err(SimError::Xml(format!(
                    "second root element <{}>",
                    node.tag()
                )));
            }
        }
        Ok(())
    }

    /// Full tag, `prefix:name` or just `name`.
    pub fn tag(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Local name (the part after the prefix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Trimmed element text.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// All child elements in document order.
    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    /// Raw attribute lookup.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Resolve a value by key: attribute first, then an un-prefixed child's text.
    pub fn raw_value(&self, key: &str) -> Option<&str> {
        self.attribute(key).or_else(|| {
            self.children
                .iter()
                .find(|c| c.prefix.is_none() && c.name == key)
                .map(|c| c.text())
        })
    }

    /// String lookup with default and required flag.
    pub fn get_string(&self, key: &str, default: &str, required: bool) -> Result<String> {
        match self.raw_value(key) {
            Some(v) => Ok(v.to_string()),
            None if required => Err(self.missing(key)),
            None => Ok(default.to_string()),
        }
    }

    /// Typed lookup with default and required flag.
    pub fn get_value<T: ParamValue>(&self, key: &str, default: T, required: bool) -> Result<T> {
        let Some(raw) = self.raw_value(key) else {
            return if required {
                Err(self.missing(key))
            } else {
                Ok(default)
            };
        };
        T::KIND
            .parse(raw)
            .and_then(|v| T::from_value(&v))
            .ok_or_else(|| SimError::InvalidParameter {
                param: key.to_string(),
                value: raw.to_string(),
                expected: T::KIND.type_name(),
            })
    }

    fn missing(&self, key: &str) -> SimError {
        SimError::MissingRequiredParameter {
            param: key.to_string(),
            element: self.tag(),
        }
    }

    /// First child whose local name matches, regardless of prefix.
    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child carrying the given prefix.
    pub fn child_by_prefix(&self, prefix: &str) -> Option<&ConfigNode> {
        self.children
            .iter()
            .find(|c| c.prefix.as_deref() == Some(prefix))
    }

    /// Every child carrying the given prefix, in document order.
    pub fn children_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.children
            .iter()
            .filter(move |c| c.prefix.as_deref() == Some(prefix))
    }

    /// Every un-prefixed child with the given local name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.children
            .iter()
            .filter(move |c| c.prefix.is_none() && c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    const SCENE: &str = r#"
        <world>
          <model:physical name="robot" xyz="1 2 3">
            <rpy>0 0 90</rpy>
            <body:box name="chassis"/>
            <body:box name="wheel"/>
            <joint:hinge name="axle" body1="chassis" body2="wheel"/>
          </model:physical>
        </world>
    "#;

    #[test]
    fn parse_splits_prefix_and_name() {
        let root = ConfigNode::parse(SCENE).unwrap();
        assert_eq!(root.name(), "world");
        let model = root.child_by_prefix("model").unwrap();
        assert_eq!(model.prefix(), Some("model"));
        assert_eq!(model.name(), "physical");
        assert_eq!(model.tag(), "model:physical");
        assert!(root.child_by_prefix("joint").is_none());
        assert!(model.child_by_prefix("joint").is_some());
    }

    #[test]
    fn values_resolve_from_attributes_and_child_text() {
        let root = ConfigNode::parse(SCENE).unwrap();
        let model = root.child_by_prefix("model").unwrap();
        assert_eq!(model.raw_value("xyz"), Some("1 2 3"));
        assert_eq!(model.raw_value("rpy"), Some("0 0 90"));
        let xyz: DVec3 = model.get_value("xyz", DVec3::ZERO, false).unwrap();
        assert_eq!(xyz, DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn prefix_iteration_keeps_document_order() {
        let root = ConfigNode::parse(SCENE).unwrap();
        let model = root.child_by_prefix("model").unwrap();
        let names: Vec<_> = model
            .children_by_prefix("body")
            .map(|b| b.attribute("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["chassis", "wheel"]);
        assert_eq!(model.children_by_prefix("joint").count(), 1);
    }

    #[test]
    fn required_value_missing_is_an_error() {
        let node = ConfigNode::new("controller:pose_sensor");
        let err = node.get_string("name", "", true).unwrap_err();
        assert!(matches!(err, SimError::MissingRequiredParameter { .. }));
        assert_eq!(node.get_string("name", "fallback", false).unwrap(), "fallback");
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let node = ConfigNode::new("model:physical").with_attr("selfID", "three");
        let err = node.get_value::<i32>("selfID", -1, false).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { .. }));
    }

    #[test]
    fn escaped_attributes_are_unescaped() {
        let root = ConfigNode::parse(r#"<a team="&lt;blue &amp; gold&gt;"/>"#).unwrap();
        assert_eq!(root.attribute("team"), Some("<blue & gold>"));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(matches!(
            ConfigNode::parse("<a><b></a>"),
            Err(SimError::Xml(_))
        ));
        assert!(matches!(ConfigNode::parse(""), Err(SimError::Xml(_))));
    }
}
