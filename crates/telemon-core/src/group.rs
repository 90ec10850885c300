//! Element groups.
//!
//! A group stamps a list of templates out under one prefix: template
//! `pos` in group `X` answers to `X.pos`. Each child is built fresh, so
//! two groups made from the same templates never share state.

use indexmap::IndexMap;
use telemon_ingest::Value;

use crate::element::{Element, ElementError, Render, add_border};
use crate::error::CoreError;
use crate::template::ElementTemplate;

/// Child id under a group: `<group>.<local>`.
pub fn qualified_id(group_id: &str, local_id: &str) -> String {
    format!("{group_id}.{local_id}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    id: String,
    pub enabled: bool,
    border: bool,
    children: IndexMap<String, Element>,
}

impl Group {
    pub fn from_templates(
        group_id: impl Into<String>,
        templates: &[ElementTemplate],
        border: bool,
    ) -> Result<Self, CoreError> {
        let id = group_id.into();
        if id.is_empty() {
            return Err(CoreError::config("group id must not be empty"));
        }

        let mut children = IndexMap::with_capacity(templates.len());
        for template in templates {
            let child_id = qualified_id(&id, &template.id);
            if children.contains_key(&child_id) {
                return Err(CoreError::DuplicateId { id: child_id });
            }
            let element = template.build(child_id.clone())?;
            children.insert(child_id, element);
        }

        Ok(Self {
            id,
            enabled: true,
            border,
            children,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_border(&self) -> bool {
        self.border
    }

    pub fn contains(&self, id: &str) -> bool {
        self.children.contains_key(id)
    }

    /// Qualified ids of every child, in template order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.children.get(id)
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.values()
    }

    /// `None` when no child carries `id`.
    pub fn update_element(&mut self, id: &str, args: &[Value]) -> Option<Result<(), ElementError>> {
        self.children.get_mut(id).map(|child| child.update(args))
    }

    /// Enabled children stacked top to bottom, boxed when the group has a border.
    pub fn display(&self) -> String {
        let body = self
            .children
            .values()
            .filter(|c| c.enabled)
            .map(Render::display)
            .collect::<Vec<_>>()
            .join("\n");
        if self.border {
            add_border(&body, usize::MAX)
        } else {
            body
        }
    }

    pub fn height(&self) -> usize {
        let body: usize = self
            .children
            .values()
            .filter(|c| c.enabled)
            .map(Render::height)
            .sum();
        if self.border { body + 2 } else { body }
    }

    /// Each enabled child's render keyed by its qualified id.
    pub fn flatten_into(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        for (id, child) in self.children.iter().filter(|(_, c)| c.enabled) {
            out.insert(id.clone(), serde_json::Value::String(child.display()));
        }
    }
}
