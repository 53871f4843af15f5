//! Tree flattening for report payloads
//!
//! The debt report arrives as namespaced XML; each record element is
//! flattened depth-first into a single-level map keyed by leaf tag names.
//! JSON report items arrive already flat and pass through as-is.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

/// A flattened record: leaf name to scalar value
pub type FlatRecord = Map<String, Value>;

/// One parsed XML element with namespace prefixes already stripped
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

/// Strip namespace qualifiers from a tag name, handling both the
/// `prefix:Local` wire form and the `{uri}Local` Clark notation
pub fn local_name(raw: &str) -> &str {
    let after_ns = raw.rsplit('}').next().unwrap_or(raw);
    after_ns.rsplit(':').next().unwrap_or(after_ns)
}

/// Parse an XML document into an element tree rooted at a synthetic
/// `#document` node
pub fn parse_xml(input: &str) -> Result<XmlNode, quick_xml::Error> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = vec![XmlNode {
        name: "#document".to_string(),
        text: None,
        children: Vec::new(),
    }];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let raw = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(XmlNode {
                    name: local_name(&raw).to_string(),
                    text: None,
                    children: Vec::new(),
                });
            }
            Event::Empty(e) => {
                let raw = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode {
                        name: local_name(&raw).to_string(),
                        text: None,
                        children: Vec::new(),
                    });
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                if !text.is_empty() {
                    if let Some(node) = stack.last_mut() {
                        node.text = Some(text);
                    }
                }
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    let node = stack.pop().unwrap_or_default();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(stack.pop().unwrap_or_default())
}

/// Flatten one record element depth-first.
///
/// A leaf (no element children) contributes its own tag as the key and its
/// text (possibly null) as the value; a container's flattened children are
/// merged into the accumulator. Duplicate leaf names across subtrees keep
/// the value seen last in document order.
pub fn flatten_node(element: &XmlNode) -> FlatRecord {
    let mut data = FlatRecord::new();
    for child in &element.children {
        if child.children.is_empty() {
            let value = match &child.text {
                Some(text) => Value::String(text.clone()),
                None => Value::Null,
            };
            data.insert(child.name.clone(), value);
        } else {
            for (key, value) in flatten_node(child) {
                data.insert(key, value);
            }
        }
    }
    data
}

/// Parse an XML report body and flatten every `record` element found as a
/// direct child of any `container` element (e.g. each `Loan` under
/// `Instruments`)
pub fn flatten_xml_records(
    xml: &str,
    container: &str,
    record: &str,
) -> Result<Vec<FlatRecord>, quick_xml::Error> {
    let root = parse_xml(xml)?;
    let mut records = Vec::new();
    collect_records(&root, container, record, &mut records);
    Ok(records)
}

fn collect_records(node: &XmlNode, container: &str, record: &str, out: &mut Vec<FlatRecord>) {
    if node.name == container {
        for child in &node.children {
            if child.name == record {
                out.push(flatten_node(child));
            }
        }
    }
    for child in &node.children {
        collect_records(child, container, record, out);
    }
}

/// JSON report items are already flat or near-flat; objects pass through
/// directly, anything else is kept under a single `Value` key
pub fn json_items_to_records(items: Vec<Value>) -> Vec<FlatRecord> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => map,
            other => {
                let mut map = FlatRecord::new();
                map.insert("Value".to_string(), other);
                map
            }
        })
        .collect()
}
