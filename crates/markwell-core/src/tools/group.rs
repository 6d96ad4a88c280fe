//! Tool groups: which tools a set of surfaces hosts, and in which mode.

use super::{Tool, ToolBinding, ToolMode};
use crate::error::{InteractionError, InteractionResult};
use crate::input::{InputModality, Modifiers, MouseButton};
use crate::surface::SurfaceId;
use std::collections::HashMap;
use std::fmt;

/// Per-tool configuration inside a group.
#[derive(Debug, Clone)]
struct ToolEntry {
    name: String,
    mode: ToolMode,
    bindings: Vec<ToolBinding>,
}

/// An ordered set of tools shared by one or more surfaces.
///
/// Entries (mode and bindings) and tool instances are stored separately: an
/// entry whose instance has been taken out, e.g. during teardown, still shows
/// up in binding queries and is skipped by the resolver.
pub struct ToolGroup {
    id: String,
    entries: Vec<ToolEntry>,
    tools: HashMap<String, Box<dyn Tool>>,
    surfaces: Vec<SurfaceId>,
}

impl fmt::Debug for ToolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolGroup")
            .field("id", &self.id)
            .field("entries", &self.entries)
            .field("surfaces", &self.surfaces)
            .finish()
    }
}

impl ToolGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Vec::new(),
            tools: HashMap::new(),
            surfaces: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register a tool in Disabled mode. Re-adding a name replaces the instance
    /// and keeps its mode.
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.entries.iter().any(|e| e.name == name) {
            self.entries.push(ToolEntry {
                name: name.clone(),
                mode: ToolMode::Disabled,
                bindings: Vec::new(),
            });
        }
        self.tools.insert(name, tool);
    }

    /// Remove a tool instance while keeping its entry.
    pub fn take_tool(&mut self, name: &str) -> Option<Box<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Remove a tool entirely.
    pub fn remove_tool(&mut self, name: &str) -> Option<Box<dyn Tool>> {
        self.entries.retain(|e| e.name != name);
        self.tools.remove(name)
    }

    pub fn tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn tool_mut(&mut self, name: &str) -> Option<&mut (dyn Tool + 'static)> {
        self.tools.get_mut(name).map(|t| t.as_mut())
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    fn entry_mut(&mut self, name: &str) -> InteractionResult<&mut ToolEntry> {
        let group = self.id.clone();
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| InteractionError::UnknownTool {
                group,
                tool: name.to_string(),
            })
    }

    pub fn tool_mode(&self, name: &str) -> Option<ToolMode> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.mode)
    }

    pub fn bindings(&self, name: &str) -> &[ToolBinding] {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.bindings.as_slice())
            .unwrap_or(&[])
    }

    /// Make a tool Active on the given bindings (primary button if empty).
    ///
    /// Any other Active tool holding one of these bindings is demoted to
    /// Passive, so a binding always resolves to a single tool.
    pub fn set_tool_active(&mut self, name: &str, bindings: &[ToolBinding]) -> InteractionResult<()> {
        let bindings = if bindings.is_empty() {
            vec![ToolBinding::new(MouseButton::Left)]
        } else {
            bindings.to_vec()
        };

        let entry = self.entry_mut(name)?;
        entry.mode = ToolMode::Active;
        entry.bindings = bindings.clone();

        for other in self.entries.iter_mut().filter(|e| e.name != name) {
            if other.mode == ToolMode::Active {
                other.bindings.retain(|b| !bindings.contains(b));
                if other.bindings.is_empty() {
                    log::debug!("Tool {} lost its bindings to {}; now Passive", other.name, name);
                    other.mode = ToolMode::Passive;
                }
            }
        }
        Ok(())
    }

    pub fn set_tool_passive(&mut self, name: &str) -> InteractionResult<()> {
        self.set_mode_unbound(name, ToolMode::Passive)
    }

    pub fn set_tool_enabled(&mut self, name: &str) -> InteractionResult<()> {
        self.set_mode_unbound(name, ToolMode::Enabled)
    }

    pub fn set_tool_disabled(&mut self, name: &str) -> InteractionResult<()> {
        self.set_mode_unbound(name, ToolMode::Disabled)
    }

    fn set_mode_unbound(&mut self, name: &str, mode: ToolMode) -> InteractionResult<()> {
        let entry = self.entry_mut(name)?;
        entry.mode = mode;
        entry.bindings.clear();
        Ok(())
    }

    pub fn add_surface(&mut self, surface: SurfaceId) {
        if !self.surfaces.contains(&surface) {
            self.surfaces.push(surface);
        }
    }

    pub fn remove_surface(&mut self, surface: &SurfaceId) {
        self.surfaces.retain(|s| s != surface);
    }

    pub fn has_surface(&self, surface: &SurfaceId) -> bool {
        self.surfaces.contains(surface)
    }

    pub fn surfaces(&self) -> &[SurfaceId] {
        &self.surfaces
    }

    /// Whether a tool (if instantiated) supports the modality. Missing
    /// instances pass so the resolver can report them.
    fn accepts(&self, name: &str, modality: InputModality) -> bool {
        self.tools.get(name).is_none_or(|t| t.supports(modality))
    }

    /// The single Active tool for a button press.
    ///
    /// A binding with a held modifier wins over a plain binding on the same
    /// button.
    pub fn primary_active_tool(
        &self,
        button: MouseButton,
        modifiers: &Modifiers,
        modality: InputModality,
    ) -> Option<String> {
        let matching = || {
            self.entries.iter().filter(|e| e.mode == ToolMode::Active).filter(move |e| {
                self.accepts(&e.name, modality) && e.bindings.iter().any(|b| b.matches(button, modifiers))
            })
        };
        let with_modifier = matching().find(|e| {
            e.bindings
                .iter()
                .any(|b| b.modifier.is_some() && b.matches(button, modifiers))
        });
        with_modifier.or_else(|| matching().next()).map(|e| e.name.clone())
    }

    /// Names of tools in the given modes bound to `button`, Active first,
    /// otherwise in registration order. Passive tools match the primary
    /// button only; Enabled and Disabled tools never match.
    pub fn tools_bound_to(
        &self,
        modes: &[ToolMode],
        button: MouseButton,
        modifiers: &Modifiers,
        modality: InputModality,
    ) -> Vec<String> {
        let mut names = Vec::new();
        if modes.contains(&ToolMode::Active) {
            names.extend(
                self.entries
                    .iter()
                    .filter(|e| e.mode == ToolMode::Active)
                    .filter(|e| e.bindings.iter().any(|b| b.matches(button, modifiers)))
                    .filter(|e| self.accepts(&e.name, modality))
                    .map(|e| e.name.clone()),
            );
        }
        if modes.contains(&ToolMode::Passive) && button.is_primary() {
            names.extend(
                self.entries
                    .iter()
                    .filter(|e| e.mode == ToolMode::Passive)
                    .filter(|e| self.accepts(&e.name, modality))
                    .map(|e| e.name.clone()),
            );
        }
        names
    }

    /// Names of tools in any of the given modes, in registration order.
    pub fn tools_in_modes(&self, modes: &[ToolMode]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| modes.contains(&e.mode))
            .map(|e| e.name.clone())
            .collect()
    }
}

/// All tool groups, with surface lookup.
#[derive(Debug, Default)]
pub struct ToolGroupRegistry {
    groups: Vec<ToolGroup>,
}

impl ToolGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_group(&mut self, id: impl Into<String>) -> InteractionResult<&mut ToolGroup> {
        let id = id.into();
        if self.groups.iter().any(|g| g.id == id) {
            return Err(InteractionError::DuplicateToolGroup(id));
        }
        self.groups.push(ToolGroup::new(id));
        let index = self.groups.len() - 1;
        Ok(&mut self.groups[index])
    }

    pub fn remove_group(&mut self, id: &str) -> Option<ToolGroup> {
        let index = self.groups.iter().position(|g| g.id == id)?;
        Some(self.groups.remove(index))
    }

    pub fn group(&self, id: &str) -> Option<&ToolGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut ToolGroup> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    pub fn group_for_surface(&self, surface: &SurfaceId) -> InteractionResult<&ToolGroup> {
        self.groups
            .iter()
            .find(|g| g.has_surface(surface))
            .ok_or_else(|| InteractionError::ToolGroupNotFound(surface.clone()))
    }

    pub fn group_for_surface_mut(&mut self, surface: &SurfaceId) -> InteractionResult<&mut ToolGroup> {
        self.groups
            .iter_mut()
            .find(|g| g.has_surface(surface))
            .ok_or_else(|| InteractionError::ToolGroupNotFound(surface.clone()))
    }

    /// Detach a surface from every group.
    pub fn forget_surface(&mut self, surface: &SurfaceId) {
        for group in &mut self.groups {
            group.remove_surface(surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ModifierKey;
    use crate::tools::MarkerTool;

    fn group() -> ToolGroup {
        let mut group = ToolGroup::new("main");
        group.add_tool(Box::new(MarkerTool::new("Length")));
        group.add_tool(Box::new(MarkerTool::new("Arrow")));
        group.add_tool(Box::new(MarkerTool::new("Angle")));
        group
    }

    #[test]
    fn test_new_tools_are_disabled() {
        let group = group();
        assert_eq!(group.tool_mode("Length"), Some(ToolMode::Disabled));
        assert_eq!(group.tool_names(), vec!["Length", "Arrow", "Angle"]);
    }

    #[test]
    fn test_activation_demotes_conflicting_tool() {
        let mut group = group();
        group.set_tool_active("Length", &[]).unwrap();
        group.set_tool_active("Arrow", &[ToolBinding::new(MouseButton::Left)]).unwrap();

        assert_eq!(group.tool_mode("Length"), Some(ToolMode::Passive));
        assert_eq!(group.tool_mode("Arrow"), Some(ToolMode::Active));
        assert_eq!(
            group.primary_active_tool(MouseButton::Left, &Modifiers::NONE, InputModality::Mouse),
            Some("Arrow".to_string())
        );
    }

    #[test]
    fn test_candidates_active_before_passive() {
        let mut group = group();
        group.set_tool_passive("Length").unwrap();
        group.set_tool_active("Angle", &[]).unwrap();
        group.set_tool_passive("Arrow").unwrap();

        let names = group.tools_bound_to(
            &[ToolMode::Active, ToolMode::Passive],
            MouseButton::Left,
            &Modifiers::NONE,
            InputModality::Mouse,
        );
        assert_eq!(names, vec!["Angle", "Length", "Arrow"]);
    }

    #[test]
    fn test_passive_never_binds_secondary_buttons() {
        let mut group = group();
        group.set_tool_passive("Length").unwrap();
        group.set_tool_active("Arrow", &[ToolBinding::new(MouseButton::Right)]).unwrap();

        let names = group.tools_bound_to(
            &[ToolMode::Active, ToolMode::Passive],
            MouseButton::Right,
            &Modifiers::NONE,
            InputModality::Mouse,
        );
        assert_eq!(names, vec!["Arrow"]);
    }

    #[test]
    fn test_modifier_binding_preferred() {
        let mut group = group();
        group.set_tool_active("Length", &[ToolBinding::new(MouseButton::Left)]).unwrap();
        group
            .set_tool_active(
                "Arrow",
                &[ToolBinding::with_modifier(MouseButton::Left, ModifierKey::Alt)],
            )
            .unwrap();
        let alt = Modifiers {
            alt: true,
            ..Modifiers::default()
        };

        assert_eq!(group.tool_mode("Length"), Some(ToolMode::Active));
        assert_eq!(
            group.primary_active_tool(MouseButton::Left, &alt, InputModality::Mouse),
            Some("Arrow".to_string())
        );
        assert_eq!(
            group.primary_active_tool(MouseButton::Left, &Modifiers::NONE, InputModality::Mouse),
            Some("Length".to_string())
        );
    }

    #[test]
    fn test_unknown_tool_is_an_error() {
        let mut group = group();
        let err = group.set_tool_active("Nope", &[]).unwrap_err();
        assert!(matches!(err, InteractionError::UnknownTool { .. }));
    }

    #[test]
    fn test_taken_tool_keeps_entry() {
        let mut group = group();
        group.set_tool_passive("Length").unwrap();
        assert!(group.take_tool("Length").is_some());
        assert!(group.tool("Length").is_none());
        assert_eq!(group.tools_in_modes(&[ToolMode::Passive]), vec!["Length"]);
    }

    #[test]
    fn test_registry_surface_lookup() {
        let mut registry = ToolGroupRegistry::new();
        registry.create_group("main").unwrap().add_surface(SurfaceId::new("a"));
        assert!(registry.create_group("main").is_err());

        assert_eq!(registry.group_for_surface(&SurfaceId::new("a")).unwrap().id(), "main");
        let err = registry.group_for_surface(&SurfaceId::new("b")).unwrap_err();
        assert_eq!(err, InteractionError::ToolGroupNotFound(SurfaceId::new("b")));

        registry.forget_surface(&SurfaceId::new("a"));
        assert!(registry.group_for_surface(&SurfaceId::new("a")).is_err());
    }
}
