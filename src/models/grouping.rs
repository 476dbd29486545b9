//! Location Tree
//!
//! Schools, campuses, halls and laundry rooms, loaded from a JSON document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The location tree shipped with the service
pub const DEFAULT_LOCATIONS: &str = include_str!("../../data/locations.json");

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Level of a node in the location tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingType {
    Root,
    School,
    Campus,
    Hall,
    Room,
}

/// One node of the location tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineGrouping {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub grouping_type: GroupingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Theme color such as `#3366cc`; children inherit it when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub children: Vec<MachineGrouping>,
}

impl MachineGrouping {
    /// Coordinates when both are present and finite
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// Copy of this node without its children
    pub fn summary(&self) -> MachineGrouping {
        MachineGrouping {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// Errors loading the location tree
#[derive(Debug, thiserror::Error)]
pub enum LocationsError {
    #[error("Invalid locations document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unable to read locations file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate location id: {0}")]
    DuplicateId(i64),

    #[error("Top-level location must be of type root")]
    MissingRoot,
}

/// Indexed location tree
#[derive(Debug, Clone)]
pub struct Locations {
    root: MachineGrouping,
    /// Child-index path from the root to each node
    paths: HashMap<i64, Vec<usize>>,
    parents: HashMap<i64, i64>,
}

impl Locations {
    pub fn new(root: MachineGrouping) -> Result<Self, LocationsError> {
        if root.grouping_type != GroupingType::Root {
            return Err(LocationsError::MissingRoot);
        }
        let mut locations = Self {
            root,
            paths: HashMap::new(),
            parents: HashMap::new(),
        };
        let root = locations.root.clone();
        locations.index(&root, None, &mut Vec::new())?;
        Ok(locations)
    }

    fn index(
        &mut self,
        node: &MachineGrouping,
        parent: Option<i64>,
        path: &mut Vec<usize>,
    ) -> Result<(), LocationsError> {
        if self.paths.insert(node.id, path.clone()).is_some() {
            return Err(LocationsError::DuplicateId(node.id));
        }
        if let Some(parent) = parent {
            self.parents.insert(node.id, parent);
        }
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            self.index(child, Some(node.id), path)?;
            path.pop();
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, LocationsError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, LocationsError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn builtin() -> Result<Self, LocationsError> {
        Self::from_json(DEFAULT_LOCATIONS)
    }

    pub fn root(&self) -> &MachineGrouping {
        &self.root
    }

    pub fn grouping(&self, id: i64) -> Option<&MachineGrouping> {
        let path = self.paths.get(&id)?;
        let mut node = &self.root;
        for &i in path {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub fn parent_of(&self, id: i64) -> Option<&MachineGrouping> {
        self.parents.get(&id).and_then(|parent| self.grouping(*parent))
    }

    /// Color of the node or of its nearest ancestor that has one
    pub fn color_of(&self, id: i64) -> Option<&str> {
        let mut current = self.grouping(id);
        while let Some(node) = current {
            if let Some(color) = node.color.as_deref() {
                return Some(color);
            }
            current = self.parent_of(node.id);
        }
        None
    }

    /// All laundry rooms in tree order
    pub fn rooms(&self) -> Vec<&MachineGrouping> {
        let mut rooms = Vec::new();
        collect_rooms(&self.root, &mut rooms);
        rooms
    }

    /// Node with coordinates nearest to the given point
    pub fn closest(&self, latitude: f64, longitude: f64) -> Option<&MachineGrouping> {
        let mut best: Option<(&MachineGrouping, f64)> = None;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if let Some((lat, lon)) = node.coordinates() {
                let distance = distance_meters(latitude, longitude, lat, lon);
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((node, distance));
                }
            }
            stack.extend(node.children.iter());
        }
        best.map(|(node, _)| node)
    }
}

fn collect_rooms<'a>(node: &'a MachineGrouping, out: &mut Vec<&'a MachineGrouping>) {
    if node.grouping_type == GroupingType::Room {
        out.push(node);
    }
    for child in &node.children {
        collect_rooms(child, out);
    }
}

/// Great-circle distance between two points
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r##"{
        "id": 0, "name": "All Locations", "type": "root",
        "children": [
            {"id": 1, "name": "North Campus", "type": "campus", "color": "#aa0000",
             "latitude": 43.0850, "longitude": -77.6700,
             "children": [
                {"id": 10, "name": "Hall A", "type": "hall",
                 "children": [{"id": 1001, "name": "Hall A Basement", "type": "room",
                               "latitude": 43.0851, "longitude": -77.6702}]}
             ]},
            {"id": 2, "name": "South Campus", "type": "campus",
             "latitude": 43.0500, "longitude": -77.6000, "color": "#0000aa",
             "children": [{"id": 2001, "name": "Tower Laundry", "type": "room"}]}
        ]
    }"##;

    #[test]
    fn test_lookup_and_parents() {
        let locations = Locations::from_json(TREE).unwrap();
        assert_eq!(locations.root().name, "All Locations");
        assert_eq!(locations.grouping(1001).unwrap().name, "Hall A Basement");
        assert_eq!(locations.parent_of(1001).unwrap().id, 10);
        assert_eq!(locations.parent_of(10).unwrap().id, 1);
        assert!(locations.parent_of(0).is_none());
        assert!(locations.grouping(42).is_none());
    }

    #[test]
    fn test_color_inheritance() {
        let locations = Locations::from_json(TREE).unwrap();
        assert_eq!(locations.color_of(1001), Some("#aa0000"));
        assert_eq!(locations.color_of(2001), Some("#0000aa"));
        assert_eq!(locations.color_of(0), None);
    }

    #[test]
    fn test_rooms() {
        let locations = Locations::from_json(TREE).unwrap();
        let ids: Vec<i64> = locations.rooms().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1001, 2001]);
    }

    #[test]
    fn test_closest() {
        let locations = Locations::from_json(TREE).unwrap();
        assert_eq!(locations.closest(43.0851, -77.6703).unwrap().id, 1001);
        assert_eq!(locations.closest(43.0400, -77.5900).unwrap().id, 2);
    }

    #[test]
    fn test_rejects_duplicates_and_unknown_types() {
        let dup = r#"{"id": 0, "name": "r", "type": "root", "children": [
            {"id": 5, "name": "a", "type": "room"}, {"id": 5, "name": "b", "type": "room"}]}"#;
        assert!(matches!(Locations::from_json(dup), Err(LocationsError::DuplicateId(5))));

        let bad_type = r#"{"id": 0, "name": "r", "type": "planet"}"#;
        assert!(matches!(Locations::from_json(bad_type), Err(LocationsError::Parse(_))));

        let not_root = r#"{"id": 0, "name": "r", "type": "hall"}"#;
        assert!(matches!(Locations::from_json(not_root), Err(LocationsError::MissingRoot)));
    }

    #[test]
    fn test_builtin_tree_loads() {
        let locations = Locations::builtin().unwrap();
        assert!(!locations.rooms().is_empty());
    }

    #[test]
    fn test_distance() {
        assert!(distance_meters(0.0, 0.0, 0.0, 0.0).abs() < f64::EPSILON);
        let one_degree = distance_meters(0.0, 0.0, 1.0, 0.0);
        assert!((one_degree - 111_195.0).abs() < 100.0);
    }
}
