//! Records produced by extraction and returned by storage.
//!
//! Every persisted record comes in two shapes: a *draft* built in memory by the
//! [`codec`](crate::codec) pass (no storage identity yet) and the persisted row carrying its id,
//! timestamps and active flag. Instances have a third, intermediate shape,
//! [`ResolvedInstance`], which is the only instance shape a storage collaborator ever sees.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Formatter},
    time::{SystemTime, UNIX_EPOCH},
};

#[cfg(feature = "service")]
use crate::error::FigparseError;
#[cfg(feature = "service")]
use sqlx::{sqlite::SqliteRow, FromRow, Row};

use crate::resolve::ProvisionalId;

/// Open-ended key/value pairs kept alongside a record (visibility, original type tag, source
/// component reference).
pub type PropertyBag = Map<String, Value>;

pub const PROP_VISIBLE: &str = "visible";
pub const PROP_NODE_TYPE: &str = "node_type";
pub const PROP_SOURCE_COMPONENT: &str = "source_component_id";

/// Absolute position and size of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (`x + width`).
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`).
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }
}

/// Seconds since the unix epoch, used for every timestamp column.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDraft {
    pub name: String,
    pub url: String,
    pub file_key: String,
    pub image_url: String,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub parsed_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignFile {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub file_key: String,
    pub image_url: String,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub parsed_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub active: bool,
}

impl DesignFile {
    pub fn from_draft(id: i64, draft: &FileDraft, now: i64) -> Self {
        DesignFile {
            id,
            name: draft.name.clone(),
            url: draft.url.clone(),
            file_key: draft.file_key.clone(),
            image_url: draft.image_url.clone(),
            canvas_width: draft.canvas_width,
            canvas_height: draft.canvas_height,
            parsed_at: draft.parsed_at,
            created_at: now,
            updated_at: now,
            active: true,
        }
    }
}

impl Display for DesignFile {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} (id: {}, key: {}, canvas: {}x{})",
            self.name, self.id, self.file_key, self.canvas_width, self.canvas_height
        )
    }
}

/// A record that is keyed by the identifier of the node it was extracted from.
pub trait SourceNode {
    fn source_node_id(&self) -> &str;
}

/// A component extracted from the tree or the API component maps, not yet written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentDraft {
    pub node_id: String,
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub geometry: BoundingBox,
    pub z_index: i32,
    pub properties: PropertyBag,
}

impl SourceNode for ComponentDraft {
    fn source_node_id(&self) -> &str {
        &self.node_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: i64,
    pub file_id: i64,
    pub node_id: String,
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub geometry: BoundingBox,
    pub z_index: i32,
    pub properties: PropertyBag,
    pub created_at: i64,
    pub updated_at: i64,
    pub active: bool,
}

impl Component {
    pub fn from_draft(id: i64, file_id: i64, draft: &ComponentDraft, now: i64) -> Self {
        Component {
            id,
            file_id,
            node_id: draft.node_id.clone(),
            name: draft.name.clone(),
            kind: draft.kind.clone(),
            description: draft.description.clone(),
            geometry: draft.geometry,
            z_index: draft.z_index,
            properties: draft.properties.clone(),
            created_at: now,
            updated_at: now,
            active: true,
        }
    }
}

impl SourceNode for Component {
    fn source_node_id(&self) -> &str {
        &self.node_id
    }
}

/// An instance extracted from the tree. `component` is a placeholder that only
/// [`ComponentIdMap`](crate::resolve::ComponentIdMap) can turn into a storage identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceDraft {
    pub component: ProvisionalId,
    pub node_id: String,
    pub name: String,
    pub geometry: BoundingBox,
    pub properties: PropertyBag,
}

impl InstanceDraft {
    /// The component reference the source document used, kept for diagnosis.
    pub fn source_component_id(&self) -> Option<&str> {
        self.properties
            .get(PROP_SOURCE_COMPONENT)
            .and_then(Value::as_str)
    }
}

impl SourceNode for InstanceDraft {
    fn source_node_id(&self) -> &str {
        &self.node_id
    }
}

/// An instance whose component reference has been mapped to a persisted component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInstance {
    pub component_id: i64,
    pub node_id: String,
    pub name: String,
    pub geometry: BoundingBox,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub component_id: i64,
    pub node_id: String,
    pub name: String,
    pub geometry: BoundingBox,
    pub properties: PropertyBag,
    pub created_at: i64,
    pub updated_at: i64,
    pub active: bool,
}

impl Instance {
    pub fn from_resolved(id: i64, resolved: &ResolvedInstance, now: i64) -> Self {
        Instance {
            id,
            component_id: resolved.component_id,
            node_id: resolved.node_id.clone(),
            name: resolved.name.clone(),
            geometry: resolved.geometry,
            properties: resolved.properties.clone(),
            created_at: now,
            updated_at: now,
            active: true,
        }
    }
}

impl SourceNode for Instance {
    fn source_node_id(&self) -> &str {
        &self.node_id
    }
}

/// A persisted file with everything that hangs off it, assembled for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDetails {
    pub file: DesignFile,
    pub components: Vec<Component>,
    pub instances: Vec<Instance>,
}

#[cfg(feature = "service")]
fn bag_from_row(row: &SqliteRow) -> sqlx::Result<PropertyBag> {
    let raw: Option<&str> = row.try_get("properties")?;
    match raw {
        None | Some("") => Ok(PropertyBag::new()),
        Some(text) => {
            let bag = serde_json::from_str::<PropertyBag>(text).map_err(FigparseError::from)?;
            Ok(bag)
        }
    }
}

#[cfg(feature = "service")]
fn geometry_from_row(row: &SqliteRow) -> sqlx::Result<BoundingBox> {
    Ok(BoundingBox {
        x: row.try_get("x")?,
        y: row.try_get("y")?,
        width: row.try_get("width")?,
        height: row.try_get("height")?,
    })
}

#[cfg(feature = "service")]
impl FromRow<'_, SqliteRow> for DesignFile {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(DesignFile {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            file_key: row.try_get("file_key")?,
            image_url: row.try_get("image_url")?,
            canvas_width: row.try_get("canvas_width")?,
            canvas_height: row.try_get("canvas_height")?,
            parsed_at: row.try_get("parsed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            active: row.try_get("active")?,
        })
    }
}

#[cfg(feature = "service")]
impl FromRow<'_, SqliteRow> for Component {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Component {
            id: row.try_get("id")?,
            file_id: row.try_get("file_id")?,
            node_id: row.try_get("node_id")?,
            name: row.try_get("name")?,
            kind: row.try_get("kind")?,
            description: row.try_get("description")?,
            geometry: geometry_from_row(row)?,
            z_index: row.try_get("z_index")?,
            properties: bag_from_row(row)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            active: row.try_get("active")?,
        })
    }
}

#[cfg(feature = "service")]
impl FromRow<'_, SqliteRow> for Instance {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Instance {
            id: row.try_get("id")?,
            component_id: row.try_get("component_id")?,
            node_id: row.try_get("node_id")?,
            name: row.try_get("name")?,
            geometry: geometry_from_row(row)?,
            properties: bag_from_row(row)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            active: row.try_get("active")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_bounding_box_edges() {
        let bbox = BoundingBox::new(10.0, -5.0, 30.0, 20.0);
        assert_eq!(bbox.max_x(), 40.0);
        assert_eq!(bbox.max_y(), 15.0);
    }

    #[test]
    fn test_instance_draft_keeps_source_reference() {
        let mut properties = PropertyBag::new();
        properties.insert(PROP_SOURCE_COMPONENT.into(), Value::from("12:7"));
        let draft = InstanceDraft {
            component: ProvisionalId::from_position(0),
            node_id: "40:1".into(),
            name: "Button#1".into(),
            properties,
            ..Default::default()
        };
        assert_eq!(draft.source_component_id(), Some("12:7"));
        assert_eq!(draft.source_node_id(), "40:1");
    }
}
