//! Element registry and update dispatch.
//!
//! The manager owns every top-level node (standalone elements and
//! groups) in insertion order. Decoded updates are routed by id with a
//! linear scan; ids are unique across standalone elements, group ids and
//! qualified group children, so the scan can stop at the first match.

use serde::Serialize;
use telemon_ingest::{DecodedUpdate, Value};
use tracing::{debug, trace, warn};

use crate::element::{Element, Render};
use crate::error::CoreError;
use crate::group::Group;
use crate::template::ElementTemplate;

/// One top-level entry in the layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Group(Group),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Self::Element(e) => &e.id,
            Self::Group(g) => g.id(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Element(e) => e.enabled,
            Self::Group(g) => g.enabled,
        }
    }

    fn display(&self) -> String {
        match self {
            Self::Element(e) => e.display(),
            Self::Group(g) => g.display(),
        }
    }

    fn height(&self) -> usize {
        match self {
            Self::Element(e) => e.height(),
            Self::Group(g) => g.height(),
        }
    }

    fn owns(&self, id: &str) -> bool {
        match self {
            Self::Element(e) => e.id == id,
            Self::Group(g) => g.id() == id || g.contains(id),
        }
    }
}

/// Running totals for [`Manager::dispatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub applied: u64,
    pub unknown_ids: u64,
    pub invalid_values: u64,
}

#[derive(Debug, Default)]
pub struct Manager {
    nodes: Vec<Node>,
    buffer: Vec<String>,
    stats: DispatchStats,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────────

    pub fn add_element(&mut self, element: Element) -> Result<(), CoreError> {
        self.ensure_free(&element.id)?;
        debug!(id = %element.id, kind = element.widget.kind(), "element registered");
        self.nodes.push(Node::Element(element));
        Ok(())
    }

    /// Build a standalone element from `template` under its own id.
    pub fn add_template(&mut self, template: &ElementTemplate) -> Result<(), CoreError> {
        self.add_element(template.instantiate()?)
    }

    /// Stamp `templates` out under `group_id`, boxed.
    pub fn add_element_group(
        &mut self,
        group_id: &str,
        templates: &[ElementTemplate],
    ) -> Result<(), CoreError> {
        self.add_group(Group::from_templates(group_id, templates, true)?)
    }

    pub fn add_group(&mut self, group: Group) -> Result<(), CoreError> {
        self.ensure_free(group.id())?;
        for id in group.ids() {
            self.ensure_free(id)?;
        }
        debug!(group = group.id(), children = group.ids().count(), "group registered");
        self.nodes.push(Node::Group(group));
        Ok(())
    }

    fn ensure_free(&self, id: &str) -> Result<(), CoreError> {
        if self.nodes.iter().any(|n| n.owns(id)) {
            return Err(CoreError::DuplicateId { id: id.to_owned() });
        }
        Ok(())
    }

    // ── Updates ──────────────────────────────────────────────────────

    /// Apply `args` to the element registered under `id`.
    pub fn update(&mut self, id: &str, args: &[Value]) -> Result<(), CoreError> {
        for node in &mut self.nodes {
            let outcome = match node {
                Node::Element(e) if e.id == id => Some(e.update(args)),
                Node::Element(_) => None,
                Node::Group(g) => g.update_element(id, args),
            };
            if let Some(result) = outcome {
                return result.map_err(|source| CoreError::InvalidElementValue {
                    id: id.to_owned(),
                    source,
                });
            }
        }
        Err(CoreError::UnknownElement { id: id.to_owned() })
    }

    /// Route every entry of a decoded update. Unknown ids and rejected
    /// values are logged and counted; the remaining entries still apply.
    pub fn dispatch(&mut self, update: &DecodedUpdate) {
        for (id, args) in update.iter() {
            match self.update(id, args) {
                Ok(()) => {
                    trace!(id, "update applied");
                    self.stats.applied += 1;
                }
                Err(CoreError::UnknownElement { .. }) => {
                    warn!(id, values = ?args, "update for unknown element");
                    self.stats.unknown_ids += 1;
                }
                Err(e) => {
                    warn!(id, values = ?args, error = %e, "update rejected");
                    self.stats.invalid_values += 1;
                }
            }
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Re-render every node into the buffer, one entry per top-level
    /// node. Disabled nodes leave an empty entry.
    pub fn render(&mut self) -> &[String] {
        self.buffer.clear();
        self.buffer.extend(self.nodes.iter().map(|node| {
            if node.is_enabled() {
                node.display()
            } else {
                String::new()
            }
        }));
        &self.buffer
    }

    /// Output of the last [`render`](Self::render).
    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }

    /// The last render as one block of text.
    pub fn frame(&self) -> String {
        self.buffer
            .iter()
            .filter(|entry| !entry.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Current render of every enabled element keyed by dispatch id;
    /// group children appear under their qualified ids.
    pub fn flatten(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        for node in self.nodes.iter().filter(|n| n.is_enabled()) {
            match node {
                Node::Element(e) => {
                    out.insert(e.id.clone(), serde_json::Value::String(e.display()));
                }
                Node::Group(g) => g.flatten_into(&mut out),
            }
        }
        out
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(e) if e.id == id => Some(e),
            Node::Element(_) => None,
            Node::Group(g) => g.element(id),
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Terminal lines taken by all enabled nodes.
    pub fn height(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_enabled())
            .map(Node::height)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::element::{IndicatorLampConfig, ProgressBarConfig, TextElementConfig};
    use crate::template::WidgetSpec;
    use pretty_assertions::assert_eq;

    fn text(id: &str) -> ElementTemplate {
        ElementTemplate::new(id, WidgetSpec::Text(TextElementConfig::default()))
    }

    fn progress(id: &str) -> ElementTemplate {
        ElementTemplate::new(id, WidgetSpec::ProgressBar(ProgressBarConfig::default()))
    }

    #[test]
    fn routes_to_standalone_and_grouped_elements() {
        let mut manager = Manager::new();
        manager.add_template(&text("status")).unwrap();
        manager.add_element_group("X", &[text("name")]).unwrap();

        manager.update("status", &[Value::from("idle")]).unwrap();
        manager.update("X.name", &[Value::from("left")]).unwrap();

        assert_eq!(manager.element("status").unwrap().display(), "idle");
        assert_eq!(manager.element("X.name").unwrap().display(), "left");
    }

    #[test]
    fn unknown_and_invalid_updates_are_errors() {
        let mut manager = Manager::new();
        manager.add_template(&progress("p")).unwrap();
        assert!(matches!(
            manager.update("q", &[Value::Int(1)]),
            Err(CoreError::UnknownElement { .. })
        ));
        assert!(matches!(
            manager.update("p", &[Value::from("lots")]),
            Err(CoreError::InvalidElementValue { .. })
        ));
    }

    #[test]
    fn dispatch_applies_what_it_can() {
        let mut manager = Manager::new();
        manager.add_template(&progress("p")).unwrap();
        manager.add_template(&text("t")).unwrap();

        let update: DecodedUpdate = [
            ("p", vec![Value::from("nope")]),
            ("ghost", vec![Value::Int(1)]),
            ("t", vec![Value::from("hi")]),
        ]
        .into_iter()
        .collect();
        manager.dispatch(&update);

        assert_eq!(manager.element("t").unwrap().display(), "hi");
        assert_eq!(
            manager.stats(),
            DispatchStats {
                applied: 1,
                unknown_ids: 1,
                invalid_values: 1,
            }
        );
    }

    #[test]
    fn duplicate_ids_are_rejected_across_namespaces() {
        let mut manager = Manager::new();
        manager.add_element_group("X", &[text("name")]).unwrap();

        let err = manager.add_template(&text("X.name")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { ref id } if id == "X.name"));
        assert!(manager.add_template(&text("X")).is_err());
        assert!(manager.add_element_group("X", &[text("other")]).is_err());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn render_keeps_one_entry_per_node() {
        let mut manager = Manager::new();
        manager.add_template(&text("a")).unwrap();
        let mut hidden = text("b");
        hidden.enabled = false;
        manager.add_template(&hidden).unwrap();
        manager.add_element_group("G", &[text("c")]).unwrap();
        manager.update("a", &[Value::from("first")]).unwrap();
        manager.update("b", &[Value::from("secret")]).unwrap();

        let buffer = manager.render().to_vec();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer[0], "first");
        assert_eq!(buffer[1], "");
        assert!(buffer[2].starts_with('+'));
        assert!(!manager.frame().contains("secret"));
    }

    #[test]
    fn flatten_uses_dispatch_ids() {
        let mut manager = Manager::new();
        manager.add_template(&text("status")).unwrap();
        manager
            .add_element_group(
                "Y",
                &[ElementTemplate::new(
                    "lamp",
                    WidgetSpec::IndicatorLamp(IndicatorLampConfig::default()),
                )],
            )
            .unwrap();
        let flat = manager.flatten();
        let keys: Vec<_> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["status", "Y.lamp"]);
    }

    #[test]
    fn height_sums_enabled_nodes() {
        let mut manager = Manager::new();
        manager.add_template(&text("a")).unwrap();
        manager.add_element_group("G", &[text("b"), text("c")]).unwrap();
        assert_eq!(manager.height(), 1 + 2 + 2);
    }
}
