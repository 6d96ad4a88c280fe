//! Annotation identities and the in-memory store the resolver queries.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub Uuid);

impl AnnotationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnnotationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reference to an annotation as held by the selection and lock registries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationRef {
    pub id: AnnotationId,
    pub tool_name: String,
}

/// An annotation as seen by the interaction engine.
///
/// Geometry is a list of handle positions in world space. The engine itself
/// never edits it; tools do, while they own an interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    /// Name of the tool that created and draws this annotation.
    pub tool_name: String,
    pub frame_of_reference: String,
    /// Draggable handle positions in world space.
    pub handles: Vec<Point>,
    /// Optional slice/plane key used by visibility predicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<String>,
}

impl Annotation {
    pub fn new(
        tool_name: impl Into<String>,
        frame_of_reference: impl Into<String>,
        handles: Vec<Point>,
    ) -> Self {
        Self {
            id: AnnotationId::new(),
            tool_name: tool_name.into(),
            frame_of_reference: frame_of_reference.into(),
            handles,
            plane: None,
        }
    }

    pub fn with_plane(mut self, plane: impl Into<String>) -> Self {
        self.plane = Some(plane.into());
        self
    }

    pub fn reference(&self) -> AnnotationRef {
        AnnotationRef {
            id: self.id,
            tool_name: self.tool_name.clone(),
        }
    }
}

/// Annotations grouped by frame of reference, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    frames: HashMap<String, Vec<Annotation>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation and return its reference.
    pub fn add(&mut self, annotation: Annotation) -> AnnotationRef {
        let reference = annotation.reference();
        self.frames
            .entry(annotation.frame_of_reference.clone())
            .or_default()
            .push(annotation);
        reference
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        for annotations in self.frames.values_mut() {
            if let Some(index) = annotations.iter().position(|a| a.id == id) {
                return Some(annotations.remove(index));
            }
        }
        None
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.frames.values().flatten().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.frames.values_mut().flatten().find(|a| a.id == id)
    }

    /// Annotations of one tool in one frame of reference, in stored order.
    pub fn for_tool<'a>(
        &'a self,
        frame_of_reference: &str,
        tool_name: &'a str,
    ) -> impl Iterator<Item = &'a Annotation> + use<'a> {
        self.frames
            .get(frame_of_reference)
            .into_iter()
            .flatten()
            .filter(move |a| a.tool_name == tool_name)
    }

    pub fn has_for_tool(&self, frame_of_reference: &str, tool_name: &str) -> bool {
        self.for_tool(frame_of_reference, tool_name).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_tool_preserves_order() {
        let mut store = AnnotationStore::new();
        let a = store.add(Annotation::new("Length", "FOR", vec![Point::ZERO]));
        store.add(Annotation::new("Arrow", "FOR", vec![Point::ZERO]));
        let c = store.add(Annotation::new("Length", "FOR", vec![Point::ZERO]));
        store.add(Annotation::new("Length", "OTHER", vec![Point::ZERO]));

        let ids: Vec<_> = store.for_tool("FOR", "Length").map(|a| a.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert!(store.has_for_tool("OTHER", "Length"));
        assert!(!store.has_for_tool("OTHER", "Arrow"));
        assert!(!store.has_for_tool("MISSING", "Length"));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_remove_and_get() {
        let mut store = AnnotationStore::new();
        let a = store.add(Annotation::new("Length", "FOR", vec![Point::new(1.0, 2.0)]));
        assert_eq!(store.get(a.id).map(|x| x.handles.len()), Some(1));

        store.get_mut(a.id).unwrap().handles.push(Point::new(3.0, 4.0));
        assert_eq!(store.get(a.id).map(|x| x.handles.len()), Some(2));

        assert!(store.remove(a.id).is_some());
        assert!(store.get(a.id).is_none());
        assert!(store.is_empty());
    }
}
