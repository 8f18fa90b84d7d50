use crate::error::{DashboardError, Result};
use geojson::{GeoJson, Geometry, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Closed polygon ring in (lon, lat)
pub type Ring = Vec<(f64, f64)>;

/// Property keys tried, in order, for a feature's region name
const NAME_KEYS: [&str; 4] = ["shapeName", "name", "NAME_1", "admin1"];

/// How boundary names are rewritten to match the event table's `admin1`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionAliases {
    /// Trailing words removed from boundary names (case-insensitive)
    pub strip_suffixes: Vec<String>,
    /// Exact renames applied after suffix stripping
    pub aliases: BTreeMap<String, String>,
}

impl Default for RegionAliases {
    fn default() -> Self {
        let aliases = [
            ("Kiev", "Kyiv"),
            ("Kiev City", "Kyiv City"),
            ("Kyiv city", "Kyiv City"),
            ("Crimea", "Autonomous Republic of Crimea"),
            ("Odessa", "Odesa"),
            ("Zaporizhzhia", "Zaporizhia"),
            ("Sevastopol City", "Sevastopol"),
            ("Ivano-Frankivs'k", "Ivano-Frankivsk"),
            ("Khmelnytskyy", "Khmelnytskyi"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            strip_suffixes: vec![" Oblast".to_string(), " Region".to_string()],
            aliases,
        }
    }
}

/// Map a boundary name onto the event table's naming
pub fn normalize_region_name(raw: &str, rules: &RegionAliases) -> String {
    let mut name = raw.trim();

    for suffix in &rules.strip_suffixes {
        let cut = name.len().checked_sub(suffix.len());
        if let Some(cut) = cut.filter(|c| name.is_char_boundary(*c)) {
            if name[cut..].eq_ignore_ascii_case(suffix) {
                name = name[..cut].trim_end();
                break;
            }
        }
    }

    rules
        .aliases
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

/// One administrative region, possibly made of several polygons
#[derive(Debug, Clone, PartialEq)]
pub struct RegionShape {
    pub name: String,
    pub rings: Vec<Ring>,
    /// (min_lon, min_lat, max_lon, max_lat)
    pub bbox: (f64, f64, f64, f64),
    /// Label anchor: centroid of the largest ring
    pub centroid: (f64, f64),
}

impl RegionShape {
    fn new(name: String, rings: Vec<Ring>) -> Option<Self> {
        let mut points = rings.iter().flatten();
        let &(x, y) = points.next()?;
        let bbox = points.fold((x, y, x, y), |(x0, y0, x1, y1), &(px, py)| {
            (x0.min(px), y0.min(py), x1.max(px), y1.max(py))
        });

        let largest = rings
            .iter()
            .max_by(|a, b| ring_area(a).abs().total_cmp(&ring_area(b).abs()))?;
        let centroid = ring_centroid(largest);

        Some(Self {
            name,
            rings,
            bbox,
            centroid,
        })
    }
}

/// Signed shoelace area in squared degrees
fn ring_area(ring: &[(f64, f64)]) -> f64 {
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a.0 * b.1 - b.0 * a.1)
        .sum::<f64>()
        / 2.0
}

fn ring_centroid(ring: &[(f64, f64)]) -> (f64, f64) {
    let area = ring_area(ring);
    if area.abs() < f64::EPSILON {
        let n = ring.len().max(1) as f64;
        let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.0, sy + p.1));
        return (sx / n, sy / n);
    }

    let (cx, cy) = ring
        .iter()
        .zip(ring.iter().cycle().skip(1))
        .fold((0.0, 0.0), |(cx, cy), (a, b)| {
            let cross = a.0 * b.1 - b.0 * a.1;
            (cx + (a.0 + b.0) * cross, cy + (a.1 + b.1) * cross)
        });
    (cx / (6.0 * area), cy / (6.0 * area))
}

/// All regions merged from the per-region boundary documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionCollection {
    regions: Vec<RegionShape>,
}

impl RegionCollection {
    /// Merge named rings; entries sharing a name become one region
    pub fn from_parts(parts: Vec<(String, Vec<Ring>)>) -> Self {
        let mut merged: BTreeMap<String, Vec<Ring>> = BTreeMap::new();
        for (name, rings) in parts {
            merged.entry(name).or_default().extend(rings);
        }

        let regions = merged
            .into_iter()
            .filter_map(|(name, rings)| RegionShape::new(name, rings))
            .collect();
        Self { regions }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionShape> {
        self.regions.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&RegionShape> {
        self.regions.iter().find(|r| r.name == name)
    }
}

/// Load every GeoJSON document in `dir` into one collection.
///
/// A missing directory gives an empty collection; unreadable or malformed
/// documents are logged and skipped.
pub fn load_region_boundaries(dir: &Path, rules: &RegionAliases) -> RegionCollection {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::info!("no boundary documents at {}: {}", dir.display(), e);
            return RegionCollection::default();
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("geojson") | Some("json")
            )
        })
        .collect();
    paths.sort();

    let mut parts = Vec::new();
    for path in &paths {
        match load_boundary_document(path) {
            Ok(named) => {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                for (name, rings) in named {
                    let raw = name.unwrap_or_else(|| stem.clone());
                    parts.push((normalize_region_name(&raw, rules), rings));
                }
            }
            Err(e) => log::warn!("skipping boundary document: {}", e),
        }
    }

    let collection = RegionCollection::from_parts(parts);
    log::info!(
        "loaded {} regions from {} boundary documents",
        collection.len(),
        paths.len()
    );
    collection
}

/// Parse one document into (feature name, exterior rings) pairs
pub fn load_boundary_document(path: &Path) -> Result<Vec<(Option<String>, Vec<Ring>)>> {
    let boundary_err = |reason: String| DashboardError::Boundary {
        path: path.to_path_buf(),
        reason,
    };

    let mut bytes = fs::read(path).map_err(|source| DashboardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.starts_with(b"\xEF\xBB\xBF") {
        bytes.drain(..3);
    }

    let value: serde_json::Value =
        simd_json::serde::from_slice(&mut bytes).map_err(|e| boundary_err(e.to_string()))?;
    let geojson = GeoJson::from_json_value(value).map_err(|e| boundary_err(e.to_string()))?;

    let mut named = Vec::new();
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    named.push((feature_name(feature.properties.as_ref()), geometry_rings(geometry)));
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                named.push((feature_name(f.properties.as_ref()), geometry_rings(geometry)));
            }
        }
        GeoJson::Geometry(geometry) => {
            named.push((None, geometry_rings(&geometry)));
        }
    }

    named.retain(|(_, rings)| !rings.is_empty());
    if named.is_empty() {
        return Err(boundary_err("no polygon geometry".to_string()));
    }
    Ok(named)
}

fn feature_name(props: Option<&geojson::JsonObject>) -> Option<String> {
    let props = props?;
    NAME_KEYS
        .iter()
        .find_map(|key| props.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

fn geometry_rings(geometry: &Geometry) -> Vec<Ring> {
    let mut rings = Vec::new();
    collect_rings(geometry, &mut rings);
    rings
}

fn collect_rings(geometry: &Geometry, rings: &mut Vec<Ring>) {
    match &geometry.value {
        Value::Polygon(polygon) => {
            if let Some(exterior) = polygon.first() {
                rings.push(exterior.iter().map(|c| (c[0], c[1])).collect());
            }
        }
        Value::MultiPolygon(polygons) => {
            for polygon in polygons {
                if let Some(exterior) = polygon.first() {
                    rings.push(exterior.iter().map(|c| (c[0], c[1])).collect());
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_rings(g, rings);
            }
        }
        _ => {}
    }
}
