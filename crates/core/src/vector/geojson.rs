//! Minimal GeoJSON reader for polygon layers
//!
//! Accepts a `FeatureCollection`, a single `Feature`, or a bare
//! `Polygon`/`MultiPolygon` geometry. Only polygonal geometries are
//! meaningful for mobility layers; any other geometry type is rejected.

use super::{AttributeValue, Feature, FeatureCollection};
use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use std::path::Path;

const OPERATION: &str = "GeoJSON decode";

/// Read a GeoJSON file into a feature collection
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_geojson(&text).map_err(|e| match e {
        Error::ExternalOperation { operation, detail } => Error::ExternalOperation {
            operation,
            detail: format!("{}: {}", path.as_ref().display(), detail),
        },
        other => other,
    })
}

/// Parse GeoJSON text into a feature collection
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| Error::external(OPERATION, e.to_string()))?;

    let mut collection = FeatureCollection::new();
    collection.crs = parse_crs(&root);

    match type_of(&root)? {
        "FeatureCollection" => {
            let features = root
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::external(OPERATION, "FeatureCollection without 'features' array"))?;
            for (i, f) in features.iter().enumerate() {
                let mut feature = parse_feature(f)?;
                if feature.id.is_none() {
                    feature.id = Some(i.to_string());
                }
                collection.push(feature);
            }
        }
        "Feature" => collection.push(parse_feature(&root)?),
        _ => collection.push(Feature::new(parse_geometry(&root)?)),
    }

    Ok(collection)
}

fn type_of(value: &Value) -> Result<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::external(OPERATION, "object without 'type' member"))
}

/// Legacy named CRS: `{"type": "name", "properties": {"name": "EPSG:4326"}}`
fn parse_crs(root: &Value) -> Option<CRS> {
    root.get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(CRS::from_name)
}

fn parse_feature(value: &Value) -> Result<Feature> {
    if type_of(value)? != "Feature" {
        return Err(Error::external(OPERATION, "expected a Feature"));
    }

    let geometry = match value.get("geometry") {
        Some(Value::Null) | None => None,
        Some(g) => Some(parse_geometry(g)?),
    };

    let mut feature = Feature {
        geometry,
        properties: Default::default(),
        id: value.get("id").map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
    };

    if let Some(props) = value.get("properties").and_then(Value::as_object) {
        for (key, v) in props {
            feature.set_property(key.clone(), AttributeValue::from(v));
        }
    }

    Ok(feature)
}

fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let coords = value
        .get("coordinates")
        .ok_or_else(|| Error::external(OPERATION, "geometry without 'coordinates'"))?;

    match type_of(value)? {
        "Polygon" => Ok(Geometry::Polygon(parse_polygon(coords)?)),
        "MultiPolygon" => {
            let parts = coords
                .as_array()
                .ok_or_else(|| Error::external(OPERATION, "MultiPolygon coordinates must be an array"))?;
            let polygons = parts.iter().map(parse_polygon).collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        other => Err(Error::external(
            OPERATION,
            format!("unsupported geometry type '{}', polygon layers only", other),
        )),
    }
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = value
        .as_array()
        .ok_or_else(|| Error::external(OPERATION, "polygon coordinates must be an array of rings"))?;

    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings
        .next()
        .ok_or_else(|| Error::external(OPERATION, "polygon without exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let positions = value
        .as_array()
        .ok_or_else(|| Error::external(OPERATION, "ring must be an array of positions"))?;

    let coords = positions
        .iter()
        .map(|p| {
            let xy = p.as_array().filter(|a| a.len() >= 2);
            match xy.and_then(|a| Some((a[0].as_f64()?, a[1].as_f64()?))) {
                Some((x, y)) => Ok(Coord { x, y }),
                None => Err(Error::external(OPERATION, format!("invalid position {}", p))),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    if coords.len() < 3 {
        return Err(Error::external(OPERATION, "ring needs at least 3 positions"));
    }

    // Polygon::new closes the ring
    Ok(LineString::new(coords))
}
