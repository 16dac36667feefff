//! Role-based waypoint renderer.
//!
//! A role is a single-bit id bound to a [`RoleDefinition`]: icon factory,
//! label factory, target surface and visibility rule. Independent sources
//! register waypoints under roles; each (waypoint, role) pair is reference
//! counted per source, so a role stays assigned until every source that asked
//! for it has let go. Each update the role selector picks at most one role
//! per waypoint to render with.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use camera::{ChangeFlags, MapCamera};
use facilities::{Waypoint, WaypointId};
use foundation::math::stable_total_cmp_f64;
use runtime::frame::FrameTick;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::canvas::SharedSurface;
use crate::error::RenderError;
use crate::icons::{IconFactory, LabelFactory, WaypointIcon};
use crate::labels::{LabelId, SharedLabelManager};
use crate::layer::{LayerId, MapLayer};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u32);

impl RoleId {
    pub fn is_single_bit(self) -> bool {
        self.0.is_power_of_two()
    }
}

/// Bit mask of roles.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(pub u32);

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet(0);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, role: RoleId) -> bool {
        self.0 & role.0 != 0
    }

    pub fn contains_all(self, other: RoleSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Single-bit roles in ascending bit order.
    pub fn iter(self) -> impl Iterator<Item = RoleId> {
        (0..u32::BITS)
            .map(|bit| 1u32 << bit)
            .filter(move |mask| self.0 & mask != 0)
            .map(RoleId)
    }
}

impl From<RoleId> for RoleSet {
    fn from(role: RoleId) -> Self {
        RoleSet(role.0)
    }
}

impl FromIterator<RoleId> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleId>>(iter: I) -> Self {
        RoleSet(iter.into_iter().fold(0, |acc, role| acc | role.0))
    }
}

impl BitOr for RoleSet {
    type Output = RoleSet;

    fn bitor(self, rhs: RoleSet) -> RoleSet {
        RoleSet(self.0 | rhs.0)
    }
}

impl BitOr for RoleId {
    type Output = RoleSet;

    fn bitor(self, rhs: RoleId) -> RoleSet {
        RoleSet(self.0 | rhs.0)
    }
}

pub type VisibilityHandler = Box<dyn Fn(&Waypoint, &MapCamera) -> bool>;

/// Capabilities of a role. Every capability is optional; a role without a
/// visibility rule is always visible.
#[derive(Default)]
pub struct RoleDefinition {
    pub icon_factory: Option<Rc<dyn IconFactory>>,
    pub label_factory: Option<Rc<dyn LabelFactory>>,
    pub surface: Option<SharedSurface>,
    pub visibility: Option<VisibilityHandler>,
}

impl fmt::Debug for RoleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleDefinition")
            .field("icon_factory", &self.icon_factory.is_some())
            .field("label_factory", &self.label_factory.is_some())
            .field("surface", &self.surface.is_some())
            .field("visibility", &self.visibility.is_some())
            .finish()
    }
}

impl RoleDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_icon_factory(mut self, factory: impl IconFactory + 'static) -> Self {
        self.icon_factory = Some(Rc::new(factory));
        self
    }

    pub fn with_label_factory(mut self, factory: impl LabelFactory + 'static) -> Self {
        self.label_factory = Some(Rc::new(factory));
        self
    }

    pub fn with_surface(mut self, surface: SharedSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_visibility(mut self, handler: impl Fn(&Waypoint, &MapCamera) -> bool + 'static) -> Self {
        self.visibility = Some(Box::new(handler));
        self
    }

    pub fn is_visible(&self, waypoint: &Waypoint, camera: &MapCamera) -> bool {
        self.visibility.as_ref().is_none_or(|handler| handler(waypoint, camera))
    }
}

/// Role definitions in the order they were added.
#[derive(Debug, Default)]
pub struct RoleCatalog {
    roles: Vec<(RoleId, RoleDefinition)>,
}

impl RoleCatalog {
    pub fn contains(&self, role: RoleId) -> bool {
        self.roles.iter().any(|(id, _)| *id == role)
    }

    pub fn get(&self, role: RoleId) -> Option<&RoleDefinition> {
        self.roles.iter().find(|(id, _)| *id == role).map(|(_, def)| def)
    }

    fn get_mut(&mut self, role: RoleId) -> Option<&mut RoleDefinition> {
        self.roles.iter_mut().find(|(id, _)| *id == role).map(|(_, def)| def)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoleId, &RoleDefinition)> {
        self.roles.iter().map(|(id, def)| (*id, def))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Registration state and render products of one waypoint.
#[derive(Debug)]
pub struct WaypointEntry {
    waypoint: Waypoint,
    /// role -> (source -> registration count)
    registrations: BTreeMap<RoleId, BTreeMap<String, u32>>,
    icon: Option<Box<dyn WaypointIcon>>,
    label: Option<LabelId>,
    last_rendered_role: Option<RoleId>,
}

impl WaypointEntry {
    fn new(waypoint: Waypoint) -> Self {
        Self {
            waypoint,
            registrations: BTreeMap::new(),
            icon: None,
            label: None,
            last_rendered_role: None,
        }
    }

    pub fn waypoint(&self) -> &Waypoint {
        &self.waypoint
    }

    pub fn roles(&self) -> RoleSet {
        self.registrations.keys().copied().collect()
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.registrations.contains_key(&role)
    }

    pub fn source_count(&self, role: RoleId, source: &str) -> u32 {
        self.registrations
            .get(&role)
            .and_then(|sources| sources.get(source))
            .copied()
            .unwrap_or(0)
    }

    pub fn icon(&self) -> Option<&dyn WaypointIcon> {
        self.icon.as_deref()
    }

    pub fn label(&self) -> Option<LabelId> {
        self.label
    }

    pub fn last_rendered_role(&self) -> Option<RoleId> {
        self.last_rendered_role
    }
}

pub type RoleSelector = Box<dyn Fn(&WaypointEntry, &RoleCatalog, &MapCamera) -> Option<RoleId>>;

/// First role, in catalog order, that the entry holds and whose visibility rule passes.
pub fn default_role_selector(entry: &WaypointEntry, catalog: &RoleCatalog, camera: &MapCamera) -> Option<RoleId> {
    catalog
        .iter()
        .find(|(role, def)| entry.has_role(*role) && def.is_visible(entry.waypoint(), camera))
        .map(|(role, _)| role)
}

pub type SharedWaypointRenderer = Rc<RefCell<WaypointRenderer>>;

pub struct WaypointRenderer {
    catalog: RoleCatalog,
    entries: BTreeMap<WaypointId, WaypointEntry>,
    labels: SharedLabelManager,
    selector: RoleSelector,
}

impl fmt::Debug for WaypointRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaypointRenderer")
            .field("catalog", &self.catalog)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl WaypointRenderer {
    pub fn new(labels: SharedLabelManager) -> Self {
        Self {
            catalog: RoleCatalog::default(),
            entries: BTreeMap::new(),
            labels,
            selector: Box::new(default_role_selector),
        }
    }

    pub fn with_role_selector(
        mut self,
        selector: impl Fn(&WaypointEntry, &RoleCatalog, &MapCamera) -> Option<RoleId> + 'static,
    ) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn shared(self) -> SharedWaypointRenderer {
        Rc::new(RefCell::new(self))
    }

    pub fn label_manager(&self) -> &SharedLabelManager {
        &self.labels
    }

    /// Returns `Ok(false)` when the role already exists; the existing definition is kept.
    pub fn add_render_role(&mut self, role: RoleId, def: RoleDefinition) -> Result<bool, RenderError> {
        if !role.is_single_bit() {
            return Err(RenderError::InvalidRole { role: role.0 });
        }
        if self.catalog.contains(role) {
            return Ok(false);
        }
        self.catalog.roles.push((role, def));
        Ok(true)
    }

    pub fn remove_render_role(&mut self, role: RoleId) -> bool {
        let before = self.catalog.roles.len();
        self.catalog.roles.retain(|(id, _)| *id != role);
        self.catalog.roles.len() != before
    }

    pub fn has_render_role(&self, role: RoleId) -> bool {
        self.catalog.contains(role)
    }

    pub fn render_role(&self, role: RoleId) -> Option<&RoleDefinition> {
        self.catalog.get(role)
    }

    pub fn render_roles(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.catalog.iter().map(|(role, _)| role)
    }

    pub fn set_icon_factory(&mut self, role: RoleId, factory: impl IconFactory + 'static) -> bool {
        let Some(def) = self.catalog.get_mut(role) else {
            return false;
        };
        def.icon_factory = Some(Rc::new(factory));
        true
    }

    pub fn set_label_factory(&mut self, role: RoleId, factory: impl LabelFactory + 'static) -> bool {
        let Some(def) = self.catalog.get_mut(role) else {
            return false;
        };
        def.label_factory = Some(Rc::new(factory));
        true
    }

    pub fn set_surface(&mut self, role: RoleId, surface: SharedSurface) -> bool {
        let Some(def) = self.catalog.get_mut(role) else {
            return false;
        };
        def.surface = Some(surface);
        true
    }

    pub fn set_visibility_handler(
        &mut self,
        role: RoleId,
        handler: impl Fn(&Waypoint, &MapCamera) -> bool + 'static,
    ) -> bool {
        let Some(def) = self.catalog.get_mut(role) else {
            return false;
        };
        def.visibility = Some(Box::new(handler));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: &WaypointId) -> Option<&WaypointEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WaypointEntry> {
        self.entries.values()
    }

    /// With `roles`, every listed role must be assigned.
    pub fn is_registered(&self, id: &WaypointId, roles: Option<RoleSet>) -> bool {
        match (self.entries.get(id), roles) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(entry), Some(roles)) => entry.roles().contains_all(roles),
        }
    }

    /// Roles missing from the catalog are ignored.
    pub fn register(&mut self, waypoint: &Waypoint, roles: RoleSet, source: &str) {
        if roles.is_empty() || source.is_empty() {
            return;
        }
        let known: Vec<RoleId> = roles.iter().filter(|role| self.catalog.contains(*role)).collect();
        if known.is_empty() {
            trace!(waypoint = %waypoint.id, roles = roles.bits(), "register ignored: no known roles");
            return;
        }
        let entry = self
            .entries
            .entry(waypoint.id.clone())
            .or_insert_with(|| WaypointEntry::new(waypoint.clone()));
        for role in known {
            *entry
                .registrations
                .entry(role)
                .or_default()
                .entry(source.to_string())
                .or_insert(0) += 1;
        }
    }

    /// Dropping the last role removes the entry and its label immediately.
    pub fn deregister(&mut self, id: &WaypointId, roles: RoleSet, source: &str) {
        if roles.is_empty() || source.is_empty() {
            return;
        }
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        for role in roles.iter() {
            let Some(sources) = entry.registrations.get_mut(&role) else {
                continue;
            };
            if let Some(count) = sources.get_mut(source) {
                *count -= 1;
                if *count == 0 {
                    sources.remove(source);
                }
            }
            if sources.is_empty() {
                entry.registrations.remove(&role);
            }
        }
        if entry.registrations.is_empty()
            && let Some(entry) = self.entries.remove(id)
            && let Some(label) = entry.label
        {
            self.labels.borrow_mut().deregister(label);
        }
    }

    /// Re-select the render role of every entry and swap icon and label on change.
    pub fn update(&mut self, camera: &MapCamera) {
        for entry in self.entries.values_mut() {
            let selected = (self.selector)(entry, &self.catalog, camera);
            if selected == entry.last_rendered_role {
                continue;
            }
            prepare_render(entry, selected, &self.catalog, &self.labels);
        }
    }

    /// Clear every role surface, then draw icons in ascending priority.
    pub fn draw(&self, camera: &MapCamera) {
        for (_, def) in self.catalog.iter() {
            if let Some(surface) = &def.surface {
                surface.borrow_mut().clear();
            }
        }

        let mut drawable: Vec<(&dyn WaypointIcon, RoleId)> = self
            .entries
            .values()
            .filter_map(|entry| Some((entry.icon()?, entry.last_rendered_role?)))
            .collect();
        drawable.sort_by(|a, b| stable_total_cmp_f64(a.0.priority(), b.0.priority()));

        for (icon, role) in drawable {
            if let Some(surface) = self.catalog.get(role).and_then(|def| def.surface.as_ref()) {
                icon.draw(&mut surface.borrow_mut(), camera);
            }
        }
    }
}

fn prepare_render(
    entry: &mut WaypointEntry,
    role: Option<RoleId>,
    catalog: &RoleCatalog,
    labels: &SharedLabelManager,
) {
    debug!(
        waypoint = %entry.waypoint.id,
        from = ?entry.last_rendered_role,
        to = ?role,
        "waypoint render role changed"
    );
    let def = role.and_then(|r| catalog.get(r).map(|def| (r, def)));
    entry.icon = def.and_then(|(r, def)| def.icon_factory.as_ref()?.icon(r, &entry.waypoint));
    let label = def.and_then(|(r, def)| def.label_factory.as_ref()?.label(r, &entry.waypoint));

    let mut manager = labels.borrow_mut();
    if let Some(old) = entry.label.take() {
        manager.deregister(old);
    }
    entry.label = label.map(|label| manager.register(label));
    entry.last_rendered_role = role;
}

/// Drives a shared renderer once per frame and owns the surface its roles draw into.
#[derive(Debug)]
pub struct WaypointLayer {
    id: LayerId,
    renderer: SharedWaypointRenderer,
    surface: SharedSurface,
}

impl WaypointLayer {
    pub fn new(id: LayerId, renderer: SharedWaypointRenderer, surface: SharedSurface) -> Self {
        Self { id, renderer, surface }
    }

    pub fn renderer(&self) -> &SharedWaypointRenderer {
        &self.renderer
    }

    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }
}

impl MapLayer for WaypointLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn on_attached(&mut self, camera: &MapCamera) {
        let size = camera.projected_size();
        self.surface.borrow_mut().resize(size.x, size.y);
    }

    fn on_map_projection_changed(&mut self, camera: &MapCamera, flags: ChangeFlags) {
        if flags.contains(ChangeFlags::PROJECTED_SIZE) {
            let size = camera.projected_size();
            self.surface.borrow_mut().resize(size.x, size.y);
        }
    }

    fn on_updated(&mut self, camera: &MapCamera, _tick: FrameTick) {
        let mut renderer = self.renderer.borrow_mut();
        renderer.update(camera);
        renderer.draw(camera);
    }
}
