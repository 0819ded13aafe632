use serde::{Deserialize, Serialize};

/// Role of a region in the daily picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionRole {
    /// Broad area defining "in scope" for track assembly.
    Monitoring,
    /// Port/gateway box whose presence implies a route relationship.
    Origin,
}

/// A named axis-aligned bounding box in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRegion {
    pub name: String,
    pub role: RegionRole,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeofenceRegion {
    /// Inclusive point-in-box test.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
    }

    /// The bounding box as `(min_lon, min_lat, max_lon, max_lat)`.
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        (self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

/// Monitoring-area presets: North Sea and the southern Baltic.
pub const MONITORING_BOXES: [(&str, (f64, f64, f64, f64)); 2] = [
    ("North Sea", (-6.0, 50.0, 10.5, 62.0)),
    ("South Baltic", (8.5, 53.3, 20.5, 56.2)),
];

/// Origin-region presets: Russian Baltic ports plus Arctic/North gateways.
/// The Kaliningrad/Baltiysk boxes are kept tight to avoid spillover from
/// the Gdansk bay traffic.
pub const ORIGIN_BOXES: [(&str, (f64, f64, f64, f64)); 10] = [
    ("Baltiysk (KO)", (19.70, 54.58, 20.05, 54.75)),
    ("Kaliningrad (lagoon)", (20.35, 54.62, 20.75, 54.78)),
    ("St Petersburg", (29.70, 59.70, 30.90, 60.10)),
    ("Ust-Luga", (28.00, 59.50, 28.80, 59.90)),
    ("Primorsk", (28.20, 60.20, 28.90, 60.50)),
    ("Murmansk", (32.60, 68.90, 33.40, 69.20)),
    ("Arkhangelsk", (40.30, 64.40, 40.90, 64.70)),
    ("Varandey", (57.60, 68.70, 58.20, 68.90)),
    ("Sabetta (Yamal LNG)", (71.00, 71.10, 71.70, 71.30)),
    ("Dudinka", (86.00, 69.30, 86.50, 69.50)),
];

/// Ordered collection of named regions with first-match-wins queries.
#[derive(Debug, Clone, Default)]
pub struct GeofenceIndex {
    regions: Vec<GeofenceRegion>,
}

impl GeofenceIndex {
    pub fn new() -> Self {
        GeofenceIndex::default()
    }

    /// Index preloaded with the monitoring and origin presets.
    pub fn with_builtin() -> Self {
        let mut index = GeofenceIndex::new();
        for (name, bbox) in MONITORING_BOXES {
            index.register(name, RegionRole::Monitoring, bbox);
        }
        for (name, bbox) in ORIGIN_BOXES {
            index.register(name, RegionRole::Origin, bbox);
        }
        index
    }

    /// Append a region. Order of registration is query order.
    pub fn register(&mut self, name: &str, role: RegionRole, bbox: (f64, f64, f64, f64)) {
        let (min_lon, min_lat, max_lon, max_lat) = bbox;
        self.regions.push(GeofenceRegion {
            name: name.to_string(),
            role,
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        });
    }

    /// Name of the first region of any role containing the point.
    pub fn contains(&self, lat: f64, lon: f64) -> Option<&str> {
        self.regions
            .iter()
            .find(|r| r.contains(lat, lon))
            .map(|r| r.name.as_str())
    }

    /// Name of the first region with the given role containing the point.
    pub fn find(&self, lat: f64, lon: f64, role: RegionRole) -> Option<&str> {
        self.regions
            .iter()
            .find(|r| r.role == role && r.contains(lat, lon))
            .map(|r| r.name.as_str())
    }

    /// Whether any region with the given role contains the point.
    pub fn contains_any(&self, lat: f64, lon: f64, role: RegionRole) -> bool {
        self.find(lat, lon, role).is_some()
    }

    pub fn regions(&self) -> &[GeofenceRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> GeofenceIndex {
        GeofenceIndex::with_builtin()
    }

    #[test]
    fn test_builtin_counts() {
        let index = index();
        assert_eq!(index.len(), MONITORING_BOXES.len() + ORIGIN_BOXES.len());
    }

    #[test]
    fn test_monitoring_hit() {
        let index = index();
        // Central North Sea
        assert!(index.contains_any(55.0, 3.0, RegionRole::Monitoring));
        assert_eq!(index.find(55.0, 3.0, RegionRole::Monitoring), Some("North Sea"));
        // Mid-Atlantic is out of scope
        assert!(!index.contains_any(45.0, -30.0, RegionRole::Monitoring));
    }

    #[test]
    fn test_origin_hit_named() {
        let index = index();
        assert_eq!(index.find(60.3, 28.5, RegionRole::Origin), Some("Primorsk"));
        assert_eq!(index.find(69.0, 33.0, RegionRole::Origin), Some("Murmansk"));
        // Gdansk bay must not hit the refined Kaliningrad boxes
        assert_eq!(index.find(54.5, 18.8, RegionRole::Origin), None);
    }

    #[test]
    fn test_role_filter() {
        let index = index();
        // Primorsk lies outside both monitoring boxes
        assert!(!index.contains_any(60.3, 28.5, RegionRole::Monitoring));
        assert!(index.contains_any(60.3, 28.5, RegionRole::Origin));
    }

    #[test]
    fn test_first_match_wins() {
        let mut index = GeofenceIndex::new();
        index.register("outer", RegionRole::Origin, (0.0, 0.0, 10.0, 10.0));
        index.register("inner", RegionRole::Origin, (4.0, 4.0, 6.0, 6.0));
        assert_eq!(index.contains(5.0, 5.0), Some("outer"));
    }

    #[test]
    fn test_boundary_inclusive() {
        let mut index = GeofenceIndex::new();
        index.register("box", RegionRole::Monitoring, (0.0, 0.0, 10.0, 10.0));
        assert!(index.contains_any(0.0, 0.0, RegionRole::Monitoring));
        assert!(index.contains_any(10.0, 10.0, RegionRole::Monitoring));
        assert!(!index.contains_any(10.0001, 10.0, RegionRole::Monitoring));
    }
}
