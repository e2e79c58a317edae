//! Named tile maps, `_maps.json` persistence and the generated `maps.js`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MAPS_JSON: &str = "_maps.json";
pub const MAPS_JS: &str = "maps.js";

#[derive(Debug, Error)]
pub enum MapError {
    #[error("Map name must not be empty")]
    EmptyName,
    #[error("Map '{0}' grid must have at least one non-empty row")]
    EmptyGrid(String),
    #[error("Map '{map}' {layer} row {row} has {len} cells, expected {expected}")]
    RowLength { map: String, layer: &'static str, row: usize, len: usize, expected: usize },
    #[error("Map '{map}' zones have {got} rows, grid has {expected}")]
    ZoneRows { map: String, got: usize, expected: usize },
    #[error("Map '{map}' grid row {row} contains '{ch}', only digits 0-9 are allowed")]
    BadCell { map: String, row: usize, ch: char },
    #[error("Cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One named map. `grid` rows are digit strings (tile ids); optional `zones`
/// rows label the same cells with single characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDef {
    pub grid: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<Value>,
    /// Editor-specific fields kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MapDef {
    pub fn width(&self) -> usize {
        self.grid.first().map(|r| r.chars().count()).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.grid.len()
    }

    /// Check that the grid is rectangular and numeric, and zones match it.
    pub fn validate(&self, name: &str) -> Result<(), MapError> {
        let width = self.width();
        if width == 0 {
            return Err(MapError::EmptyGrid(name.to_string()));
        }
        check_rows(name, "grid", &self.grid, width)?;
        for (row, line) in self.grid.iter().enumerate() {
            if let Some(ch) = line.chars().find(|c| !c.is_ascii_digit()) {
                return Err(MapError::BadCell { map: name.to_string(), row, ch });
            }
        }
        if let Some(zones) = &self.zones {
            if zones.len() != self.grid.len() {
                return Err(MapError::ZoneRows {
                    map: name.to_string(),
                    got: zones.len(),
                    expected: self.grid.len(),
                });
            }
            check_rows(name, "zones", zones, width)?;
        }
        Ok(())
    }
}

fn check_rows(map: &str, layer: &'static str, rows: &[String], expected: usize) -> Result<(), MapError> {
    for (row, line) in rows.iter().enumerate() {
        let len = line.chars().count();
        if len != expected {
            return Err(MapError::RowLength { map: map.to_string(), layer, row, len, expected });
        }
    }
    Ok(())
}

/// All maps of a game by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapSet(pub BTreeMap<String, MapDef>);

impl MapSet {
    pub fn validate(&self) -> Result<(), MapError> {
        for (name, map) in &self.0 {
            if name.trim().is_empty() {
                return Err(MapError::EmptyName);
            }
            map.validate(name)?;
        }
        Ok(())
    }

    /// Validate and insert (or replace) one map.
    pub fn upsert(&mut self, name: &str, map: MapDef) -> Result<(), MapError> {
        if name.trim().is_empty() {
            return Err(MapError::EmptyName);
        }
        map.validate(name)?;
        self.0.insert(name.to_string(), map);
        Ok(())
    }
}

pub fn load_maps(game_dir: &Path) -> Result<MapSet, MapError> {
    let path = game_dir.join(MAPS_JSON);
    if !path.exists() {
        return Ok(MapSet::default());
    }
    let text = fs::read_to_string(&path)?;
    serde_json::from_str(&text)
        .map_err(|source| MapError::Parse { path: path.display().to_string(), source })
}

/// Write `_maps.json` and regenerate `maps.js`.
pub fn save_maps(game_dir: &Path, maps: &MapSet) -> Result<(), MapError> {
    let json = serde_json::to_string_pretty(maps).unwrap_or_else(|_| "{}".to_string());
    fs::write(game_dir.join(MAPS_JSON), json + "\n")?;
    fs::write(game_dir.join(MAPS_JS), generate_maps_js(maps))?;
    Ok(())
}

pub fn generate_maps_js(maps: &MapSet) -> String {
    let json = serde_json::to_string_pretty(maps).unwrap_or_else(|_| "{}".to_string());
    format!(
        "// maps.js - ForkArcade map definitions\n\
         // Generated from _maps.json, do not edit by hand\n\
         \n\
         FA.assets.mapDefs = {json}\n\
         \n\
         {runtime}",
        json = json,
        runtime = MAPS_JS_RUNTIME
    )
}

const MAPS_JS_RUNTIME: &str = r#"function getMap(name) {
  return FA.assets.mapDefs[name] || null
}

function getMapGrid(name) {
  var m = FA.assets.mapDefs[name]
  if (!m || !m.grid) return null
  return m.grid.map(function(row) {
    return row.split('').map(Number)
  })
}

function getMapObjects(name) {
  return (FA.assets.mapDefs[name] || {}).objects || []
}

function getMapZones(name) {
  var m = FA.assets.mapDefs[name]
  if (!m || !m.zones) return null
  return m.zones.map(function(row) {
    return row.split('')
  })
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn map(grid: &[&str]) -> MapDef {
        MapDef {
            grid: grid.iter().map(|s| s.to_string()).collect(),
            zones: None,
            objects: Vec::new(),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_valid_map() {
        assert!(map(&["0110", "1001"]).validate("level1").is_ok());
    }

    #[test]
    fn test_ragged_grid() {
        assert!(matches!(
            map(&["011", "10"]).validate("level1"),
            Err(MapError::RowLength { row: 1, len: 2, expected: 3, .. })
        ));
    }

    #[test]
    fn test_non_digit_cell() {
        assert!(matches!(
            map(&["01", "x1"]).validate("level1"),
            Err(MapError::BadCell { row: 1, ch: 'x', .. })
        ));
    }

    #[test]
    fn test_zones_must_match_grid() {
        let mut m = map(&["01", "10"]);
        m.zones = Some(vec!["ab".to_string()]);
        assert!(matches!(m.validate("l"), Err(MapError::ZoneRows { got: 1, expected: 2, .. })));
        m.zones = Some(vec!["ab".to_string(), "abc".to_string()]);
        assert!(matches!(m.validate("l"), Err(MapError::RowLength { layer: "zones", .. })));
    }

    #[test]
    fn test_extra_fields_survive_round_trip() {
        let value = json!({"cave": {"grid": ["01"], "zoneDefs": {"a": "spawn"}}});
        let maps: MapSet = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&maps).unwrap(), value);
    }

    #[test]
    fn test_save_writes_both_files() {
        let temp = TempDir::new().unwrap();
        let mut maps = MapSet::default();
        maps.upsert("cave", map(&["01"])).unwrap();
        save_maps(temp.path(), &maps).unwrap();

        assert_eq!(load_maps(temp.path()).unwrap(), maps);
        let js = fs::read_to_string(temp.path().join(MAPS_JS)).unwrap();
        assert!(js.contains("FA.assets.mapDefs = {"));
        assert!(js.contains("function getMapGrid(name)"));
    }
}
