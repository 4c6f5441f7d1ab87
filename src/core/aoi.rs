use crate::utils::error::{BatchError, Result};
use std::path::Path;

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Loads an area of interest as raw GeoJSON. AppEEARS accepts a
/// FeatureCollection, a single Feature or a bare geometry, so the document is
/// passed through as-is once its shape is checked.
pub async fn load_aoi(path: &Path) -> Result<serde_json::Value> {
    let bytes = tokio::fs::read(path).await.map_err(|e| BatchError::InvalidAoi {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_aoi(&bytes).map_err(|reason| BatchError::InvalidAoi {
        path: path.display().to_string(),
        reason,
    })
}

pub fn parse_aoi(bytes: &[u8]) -> std::result::Result<serde_json::Value, String> {
    let geojson: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| format!("not valid JSON: {}", e))?;

    let kind = geojson
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| "missing GeoJSON \"type\"".to_string())?;

    match kind {
        "FeatureCollection" => {
            let features = geojson
                .get("features")
                .and_then(|f| f.as_array())
                .ok_or_else(|| "FeatureCollection has no \"features\" array".to_string())?;
            if features.is_empty() {
                return Err("FeatureCollection has no features".to_string());
            }
            if features.iter().any(|f| f.get("geometry").map_or(true, |g| g.is_null())) {
                return Err("every feature needs a geometry".to_string());
            }
        }
        "Feature" => {
            if geojson.get("geometry").map_or(true, |g| g.is_null()) {
                return Err("Feature has no geometry".to_string());
            }
        }
        t if GEOMETRY_TYPES.contains(&t) => {}
        other => return Err(format!("unsupported GeoJSON type '{}'", other)),
    }

    Ok(geojson)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_collection_accepted() {
        let doc = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[-96.6,40.4],[-90.1,40.4],[-90.1,43.5],[-96.6,43.5],[-96.6,40.4]]]}}
        ]}"#;
        let value = parse_aoi(doc).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
    }

    #[test]
    fn test_bare_geometry_accepted() {
        let doc = br#"{"type":"MultiPolygon","coordinates":[]}"#;
        assert!(parse_aoi(doc).is_ok());
    }

    #[test]
    fn test_rejections() {
        assert!(parse_aoi(b"not json").is_err());
        assert!(parse_aoi(br#"{"features":[]}"#).is_err());
        assert!(parse_aoi(br#"{"type":"FeatureCollection","features":[]}"#).is_err());
        assert!(parse_aoi(br#"{"type":"Feature","geometry":null}"#).is_err());
        assert!(parse_aoi(br#"{"type":"Topology"}"#).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid_aoi() {
        let err = load_aoi(Path::new("/no/such/iowa.geojson")).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidAoi { .. }));
    }
}
