//! An in-memory page for headless hosts and native tests.
//!
//! Supports compound CSS selectors (`tag#id.class[attr="v"]:nth-of-type(n)`)
//! joined by commas, inline-style visibility, form control values, and
//! records every synthetic event and click so callers can assert on them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::dom_utils::{Document, DomError, RenderState, SelectOption, SyntheticEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

const BODY: NodeId = NodeId(0);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeRecord {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Declarative description of an element subtree to append.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<ChildSpec>,
}

#[derive(Debug, Clone)]
enum ChildSpec {
    Element(ElementSpec),
    Text(String),
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        ElementSpec {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.children.push(ChildSpec::Text(text.to_string()));
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(ChildSpec::Element(child));
        self
    }
}

type ClickHook = Rc<dyn Fn(&MemoryDocument)>;

pub struct MemoryDocument {
    title: String,
    url: String,
    nodes: RefCell<Vec<NodeRecord>>,
    values: RefCell<HashMap<NodeId, String>>,
    focused: Cell<Option<NodeId>>,
    events: RefCell<Vec<(NodeId, SyntheticEvent)>>,
    clicks: RefCell<Vec<NodeId>>,
    hooks: RefCell<HashMap<NodeId, ClickHook>>,
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("title", &self.title)
            .field("url", &self.url)
            .field("nodes", &self.nodes.borrow().len())
            .finish()
    }
}

impl MemoryDocument {
    pub fn new(title: &str, url: &str) -> Self {
        let body = NodeRecord {
            data: NodeData::Element {
                tag: "body".to_string(),
                attributes: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        MemoryDocument {
            title: title.to_string(),
            url: url.to_string(),
            nodes: RefCell::new(vec![body]),
            values: RefCell::new(HashMap::new()),
            focused: Cell::new(None),
            events: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
            hooks: RefCell::new(HashMap::new()),
        }
    }

    pub fn body(&self) -> NodeId {
        BODY
    }

    /// Appends `spec` (and its subtree) as the last child of `parent`.
    pub fn append(&self, parent: NodeId, spec: ElementSpec) -> NodeId {
        let id = self.push_node(
            NodeData::Element {
                tag: spec.tag,
                attributes: spec.attributes,
            },
            parent,
        );
        for child in spec.children {
            match child {
                ChildSpec::Element(element) => {
                    self.append(id, element);
                }
                ChildSpec::Text(text) => {
                    self.push_node(NodeData::Text(text), id);
                }
            }
        }
        id
    }

    fn push_node(&self, data: NodeData, parent: NodeId) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(NodeRecord {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        nodes[parent.0].children.push(id);
        id
    }

    /// Detaches `node` from the tree. Its handle stays valid but matches nothing.
    pub fn remove(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let mut nodes = self.nodes.borrow_mut();
        if let NodeData::Element { attributes, .. } = &mut nodes[node.0].data {
            match attributes.iter_mut().find(|(key, _)| *key == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attributes.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let mut nodes = self.nodes.borrow_mut();
        if let NodeData::Element { attributes, .. } = &mut nodes[node.0].data {
            attributes.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    /// First attached element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.attached_elements()
            .into_iter()
            .find(|node| self.attr(*node, "id").as_deref() == Some(id))
    }

    pub fn value_of(&self, node: NodeId) -> String {
        self.value(&node).unwrap_or_default()
    }

    pub fn events_for(&self, node: NodeId) -> Vec<SyntheticEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|(target, _)| *target == node)
            .map(|(_, event)| *event)
            .collect()
    }

    pub fn click_count(&self, node: NodeId) -> usize {
        self.clicks.borrow().iter().filter(|target| **target == node).count()
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused.get()
    }

    /// Runs `hook` after every native click on `node`, e.g. to reveal a field.
    pub fn on_click(&self, node: NodeId, hook: impl Fn(&MemoryDocument) + 'static) {
        self.hooks.borrow_mut().insert(node, Rc::new(hook));
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.nodes.borrow()[node.0].data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn tag(&self, node: NodeId) -> String {
        match &self.nodes.borrow()[node.0].data {
            NodeData::Element { tag, .. } => tag.clone(),
            NodeData::Text(_) => String::new(),
        }
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes.borrow()[node.0].data, NodeData::Element { .. })
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[node.0].parent
    }

    fn child_ids(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[node.0].children.clone()
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == BODY {
                return true;
            }
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Attached elements in document order, body first.
    fn attached_elements(&self) -> Vec<NodeId> {
        let mut ordered = Vec::new();
        let mut stack = vec![BODY];
        while let Some(node) = stack.pop() {
            if !self.is_element(node) {
                continue;
            }
            ordered.push(node);
            stack.extend(self.child_ids(node).into_iter().rev());
        }
        ordered
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut ordered = Vec::new();
        let mut stack: Vec<NodeId> = self.child_ids(node).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            ordered.push(current);
            stack.extend(self.child_ids(current).into_iter().rev());
        }
        ordered
    }

    fn collect_text(&self, node: NodeId, excluded: Option<NodeId>, out: &mut String) {
        if Some(node) == excluded {
            return;
        }
        let (text, children) = {
            let nodes = self.nodes.borrow();
            match &nodes[node.0].data {
                NodeData::Text(text) => (Some(text.clone()), Vec::new()),
                NodeData::Element { .. } => (None, nodes[node.0].children.clone()),
            }
        };
        if let Some(text) = text {
            out.push_str(&text);
        }
        for child in children {
            self.collect_text(child, excluded, out);
        }
    }

    fn inline_style(&self, node: NodeId) -> HashMap<String, String> {
        self.attr(node, "style")
            .map(|style| {
                style
                    .split(';')
                    .filter_map(|declaration| {
                        let (property, value) = declaration.split_once(':')?;
                        Some((
                            property.trim().to_ascii_lowercase(),
                            value.trim().to_ascii_lowercase(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn own_display(&self, node: NodeId) -> String {
        if let Some(display) = self.inline_style(node).remove("display") {
            return display;
        }
        let hidden_input = self.tag(node) == "input"
            && self
                .attr(node, "type")
                .map_or(false, |kind| kind.eq_ignore_ascii_case("hidden"));
        if self.attr(node, "hidden").is_some() || hidden_input {
            "none".to_string()
        } else {
            "inline".to_string()
        }
    }

    fn same_tag_index(&self, node: NodeId) -> usize {
        let tag = self.tag(node);
        match self.parent_of(node) {
            Some(parent) => {
                self.child_ids(parent)
                    .into_iter()
                    .filter(|sibling| self.is_element(*sibling) && self.tag(*sibling) == tag)
                    .position(|sibling| sibling == node)
                    .unwrap_or(0)
                    + 1
            }
            None => 1,
        }
    }

    fn matches(&self, node: NodeId, compound: &Compound) -> bool {
        if let Some(tag) = &compound.tag {
            if self.tag(node) != *tag {
                return false;
            }
        }
        if let Some(id) = &compound.id {
            if self.attr(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !compound.classes.is_empty() {
            let classes = self.class_list(&node);
            if !compound.classes.iter().all(|class| classes.contains(class)) {
                return false;
            }
        }
        for (name, expected) in &compound.attributes {
            match (self.attr(node, name), expected) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != *expected => return false,
                _ => {}
            }
        }
        if let Some(index) = compound.nth_of_type {
            if self.same_tag_index(node) != index {
                return false;
            }
        }
        true
    }
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn title(&self) -> String {
        self.title.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let compounds = parse_selector_list(selector)?;
        Ok(self
            .attached_elements()
            .into_iter()
            .filter(|node| compounds.iter().any(|compound| self.matches(*node, compound)))
            .collect())
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.tag(*node)
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attr(*node, name)
    }

    fn control_type(&self, node: &NodeId) -> Option<String> {
        let declared = self.attr(*node, "type").map(|kind| kind.to_ascii_lowercase());
        match self.tag(*node).as_str() {
            "input" => Some(declared.unwrap_or_else(|| "text".to_string())),
            "button" => Some(declared.unwrap_or_else(|| "submit".to_string())),
            "select" if self.attr(*node, "multiple").is_some() => Some("select-multiple".to_string()),
            "select" => Some("select-one".to_string()),
            "textarea" => Some("textarea".to_string()),
            _ => None,
        }
    }

    fn value(&self, node: &NodeId) -> Option<String> {
        if let Some(value) = self.values.borrow().get(node) {
            return Some(value.clone());
        }
        match self.tag(*node).as_str() {
            "input" | "button" => Some(self.attr(*node, "value").unwrap_or_default()),
            "textarea" => Some(self.inner_text(node)),
            "select" => {
                let selected = self
                    .descendants(*node)
                    .into_iter()
                    .filter(|option| self.tag(*option) == "option")
                    .find(|option| self.attr(*option, "selected").is_some())
                    .or_else(|| {
                        self.descendants(*node)
                            .into_iter()
                            .find(|option| self.tag(*option) == "option")
                    });
                Some(
                    selected
                        .map(|option| {
                            self.attr(option, "value")
                                .unwrap_or_else(|| self.inner_text(&option).trim().to_string())
                        })
                        .unwrap_or_default(),
                )
            }
            _ => None,
        }
    }

    fn inner_text(&self, node: &NodeId) -> String {
        let mut text = String::new();
        self.collect_text(*node, None, &mut text);
        text
    }

    fn text_excluding(&self, container: &NodeId, excluded: &NodeId) -> String {
        let tag = self.tag(*excluded);
        let first_match = self
            .descendants(*container)
            .into_iter()
            .find(|node| self.is_element(*node) && self.tag(*node) == tag);
        let mut text = String::new();
        self.collect_text(*container, first_match, &mut text);
        text
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.parent_of(*node)
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.child_ids(*node)
            .into_iter()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    fn previous_element_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.parent_of(*node)?;
        let siblings = self.children(&parent);
        let position = siblings.iter().position(|sibling| sibling == node)?;
        position.checked_sub(1).map(|index| siblings[index])
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        self.is_attached(*node)
    }

    fn render_state(&self, node: &NodeId) -> RenderState {
        let mut has_layout_box = self.is_attached(*node);
        let mut visibility = None;
        let mut current = Some(*node);
        while let Some(candidate) = current {
            if self.own_display(candidate) == "none" {
                has_layout_box = false;
            }
            if visibility.is_none() {
                visibility = self.inline_style(candidate).remove("visibility");
            }
            current = self.parent_of(candidate);
        }
        let style = self.inline_style(*node);
        RenderState {
            has_layout_box,
            display: self.own_display(*node),
            visibility: visibility.unwrap_or_else(|| "visible".to_string()),
            opacity: style
                .get("opacity")
                .and_then(|opacity| opacity.parse::<f64>().ok())
                .unwrap_or(1.0),
        }
    }

    fn options(&self, node: &NodeId) -> Result<Vec<SelectOption>, DomError> {
        let tag = self.tag(*node);
        if tag != "select" {
            return Err(DomError::ElementTypeError {
                element: tag,
                expected_type: "select".to_string(),
            });
        }
        Ok(self
            .descendants(*node)
            .into_iter()
            .filter(|option| self.tag(*option) == "option")
            .map(|option| {
                let text = self.inner_text(&option).trim().to_string();
                SelectOption {
                    value: self.attr(option, "value").unwrap_or_else(|| text.clone()),
                    text,
                }
            })
            .collect())
    }

    fn focus(&self, node: &NodeId) -> Result<(), DomError> {
        self.focused.set(Some(*node));
        Ok(())
    }

    fn blur(&self, node: &NodeId) -> Result<(), DomError> {
        if self.focused.get() == Some(*node) {
            self.focused.set(None);
        }
        Ok(())
    }

    fn set_value(&self, node: &NodeId, value: &str) -> Result<(), DomError> {
        let tag = self.tag(*node);
        if !matches!(tag.as_str(), "input" | "textarea" | "select") {
            return Err(DomError::ElementTypeError {
                element: tag,
                expected_type: "input, textarea or select".to_string(),
            });
        }
        self.values.borrow_mut().insert(*node, value.to_string());
        Ok(())
    }

    fn dispatch(&self, node: &NodeId, event: SyntheticEvent) -> Result<(), DomError> {
        self.events.borrow_mut().push((*node, event));
        Ok(())
    }

    fn scroll_into_view(&self, _node: &NodeId) -> Result<(), DomError> {
        Ok(())
    }

    fn click(&self, node: &NodeId) -> Result<(), DomError> {
        self.clicks.borrow_mut().push(*node);
        let hook = self.hooks.borrow().get(node).cloned();
        if let Some(hook) = hook {
            hook(self);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
    nth_of_type: Option<usize>,
}

fn parse_selector_list(selector: &str) -> Result<Vec<Compound>, DomError> {
    let invalid = |error: String| DomError::InvalidSelector {
        selector: selector.to_string(),
        error,
    };
    split_top_level(selector)
        .into_iter()
        .map(|part| parse_compound(part.trim()).map_err(invalid))
        .collect()
}

/// Splits on commas that are not inside brackets, parentheses or quotes.
fn split_top_level(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut escaped = false;
    for (index, ch) in selector.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (_, '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') | (None, '(') => depth += 1,
            (None, ']') | (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&selector[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

fn read_ident(chars: &[char], index: &mut usize) -> String {
    let start = *index;
    while *index < chars.len() && is_ident_char(chars[*index]) {
        *index += 1;
    }
    chars[start..*index].iter().collect()
}

fn skip_whitespace(chars: &[char], index: &mut usize) {
    while *index < chars.len() && chars[*index].is_whitespace() {
        *index += 1;
    }
}

fn parse_compound(part: &str) -> Result<Compound, String> {
    let chars: Vec<char> = part.chars().collect();
    if chars.is_empty() {
        return Err("empty selector".to_string());
    }
    let mut compound = Compound::default();
    let mut index = 0;
    if chars[0] == '*' {
        index = 1;
    } else if is_ident_char(chars[0]) {
        compound.tag = Some(read_ident(&chars, &mut index).to_ascii_lowercase());
    }

    while index < chars.len() {
        match chars[index] {
            '#' => {
                index += 1;
                let id = read_ident(&chars, &mut index);
                if id.is_empty() {
                    return Err("expected identifier after '#'".to_string());
                }
                compound.id = Some(id);
            }
            '.' => {
                index += 1;
                let class = read_ident(&chars, &mut index);
                if class.is_empty() {
                    return Err("expected class name after '.'".to_string());
                }
                compound.classes.push(class);
            }
            '[' => {
                index += 1;
                skip_whitespace(&chars, &mut index);
                let name = read_ident(&chars, &mut index).to_ascii_lowercase();
                if name.is_empty() {
                    return Err("expected attribute name".to_string());
                }
                skip_whitespace(&chars, &mut index);
                let mut expected = None;
                if chars.get(index) == Some(&'=') {
                    index += 1;
                    skip_whitespace(&chars, &mut index);
                    expected = Some(read_attribute_value(&chars, &mut index)?);
                    skip_whitespace(&chars, &mut index);
                }
                if chars.get(index) != Some(&']') {
                    return Err("unterminated attribute selector".to_string());
                }
                index += 1;
                compound.attributes.push((name, expected));
            }
            ':' => {
                let rest: String = chars[index..].iter().collect();
                let Some(argument) = rest.strip_prefix(":nth-of-type(") else {
                    return Err(format!("unsupported pseudo-class in '{}'", rest));
                };
                let Some(close) = argument.find(')') else {
                    return Err("unterminated :nth-of-type".to_string());
                };
                let position = argument[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| format!("invalid :nth-of-type index: {}", e))?;
                compound.nth_of_type = Some(position);
                index += ":nth-of-type(".chars().count() + argument[..close].chars().count() + 1;
            }
            other => return Err(format!("unsupported token '{}'", other)),
        }
    }
    Ok(compound)
}

fn read_attribute_value(chars: &[char], index: &mut usize) -> Result<String, String> {
    match chars.get(*index) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            *index += 1;
            let mut value = String::new();
            while let Some(&ch) = chars.get(*index) {
                *index += 1;
                match ch {
                    '\\' => {
                        if let Some(&next) = chars.get(*index) {
                            value.push(next);
                            *index += 1;
                        }
                    }
                    c if c == quote => return Ok(value),
                    c => value.push(c),
                }
            }
            Err("unterminated quoted attribute value".to_string())
        }
        _ => {
            let value = read_ident(chars, index);
            if value.is_empty() {
                Err("expected attribute value".to_string())
            } else {
                Ok(value)
            }
        }
    }
}
