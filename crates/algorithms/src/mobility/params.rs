//! Movement parameter resolution
//!
//! Foot-march rows are selected by visibility; vehicle rows by name, then
//! reduced to the envelope of the least capable vehicle in the convoy.
//!
//! Foot-march table fields: `visibility`, `maxmph`, `onslope`.
//! Vehicle table fields: `name`, `weight`, `maxkph`, `onslope`, `offslope`.

use ccm_core::table::{AttributeTable, Record};
use ccm_core::{AttributeValue, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Lighting conditions of a foot march
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Day,
    Night,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Day => "Day",
            Visibility::Night => "Night",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Visibility::Day),
            "night" => Ok(Visibility::Night),
            other => Err(Error::config(format!(
                "unknown visibility '{}', expected 'day' or 'night'",
                other
            ))),
        }
    }
}

/// What to do when several foot-march rows match one visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Fail with [`Error::AmbiguousParameter`]
    #[default]
    Strict,
    /// Take the last matching row, as the legacy tools did
    LastWins,
}

/// Resolved foot-march parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootMarchParameters {
    /// Maximum march speed (mph)
    pub max_speed_mph: f64,
    /// Maximum traversable slope (percent rise)
    pub max_slope_percent: f64,
}

/// Convoy envelope: the least capable value of each vehicle attribute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleParameters {
    /// Lightest vehicle weight
    pub min_weight: f64,
    /// Heaviest vehicle weight
    pub max_weight: f64,
    /// Lowest top speed in the convoy (km/h)
    pub max_speed_kph: f64,
    /// Lowest on-road slope tolerance (percent rise)
    pub on_road_slope_percent: f64,
    /// Lowest off-road slope tolerance (percent rise)
    pub off_road_slope_percent: f64,
}

/// Resolve the foot-march record for `visibility`.
///
/// The `visibility` field is compared case-insensitively.
pub fn resolve_foot_march(
    table: &AttributeTable,
    visibility: Visibility,
    policy: MatchPolicy,
) -> Result<FootMarchParameters> {
    let rows = table.select(|row| {
        row.get("visibility")
            .and_then(AttributeValue::as_str)
            .map_or(false, |v| v.trim().eq_ignore_ascii_case(visibility.as_str()))
    });
    let criteria = format!("visibility = '{}'", visibility);

    let row = match (rows.len(), policy) {
        (0, _) => {
            return Err(Error::ParameterNotFound {
                table: table.name().to_string(),
                criteria,
            })
        }
        (1, _) | (_, MatchPolicy::LastWins) => {
            if rows.len() > 1 {
                warn!(matches = rows.len(), %criteria, "several foot-march rows match, using the last one");
            }
            rows[rows.len() - 1]
        }
        (matches, MatchPolicy::Strict) => {
            return Err(Error::AmbiguousParameter { criteria, matches })
        }
    };

    let params = FootMarchParameters {
        max_speed_mph: table.number(row, "maxmph")?,
        max_slope_percent: table.number(row, "onslope")?,
    };
    debug!(?params, "resolved foot-march parameters");
    Ok(params)
}

/// Resolve the convoy envelope for a set of vehicle type names.
///
/// Names that match no row are reported and otherwise ignored; the call
/// fails only when no row matches at all.
pub fn resolve_vehicle_convoy(table: &AttributeTable, vehicle_types: &[String]) -> Result<VehicleParameters> {
    if vehicle_types.is_empty() {
        return Err(Error::config("no vehicle types given for the convoy"));
    }

    let name_of = |row: &Record| row.get("name").and_then(AttributeValue::as_str).map(str::trim).map(String::from);
    let rows = table.select(|row| name_of(row).map_or(false, |n| vehicle_types.contains(&n)));

    for wanted in vehicle_types {
        if !rows.iter().any(|row| name_of(row).as_deref() == Some(wanted.as_str())) {
            warn!(vehicle = %wanted, table = table.name(), "vehicle type not found in table");
        }
    }

    if rows.is_empty() {
        return Err(Error::ParameterNotFound {
            table: table.name().to_string(),
            criteria: format!("name in {:?}", vehicle_types),
        });
    }

    let mut envelope = VehicleParameters {
        min_weight: f64::INFINITY,
        max_weight: f64::NEG_INFINITY,
        max_speed_kph: f64::INFINITY,
        on_road_slope_percent: f64::INFINITY,
        off_road_slope_percent: f64::INFINITY,
    };
    for row in &rows {
        let weight = table.number(row, "weight")?;
        envelope.min_weight = envelope.min_weight.min(weight);
        envelope.max_weight = envelope.max_weight.max(weight);
        envelope.max_speed_kph = envelope.max_speed_kph.min(table.number(row, "maxkph")?);
        envelope.on_road_slope_percent = envelope.on_road_slope_percent.min(table.number(row, "onslope")?);
        envelope.off_road_slope_percent = envelope.off_road_slope_percent.min(table.number(row, "offslope")?);
    }

    debug!(vehicles = rows.len(), ?envelope, "resolved convoy envelope");
    Ok(envelope)
}

/// Split a `;`-separated vehicle list such as `'M1A1';'HMMWV'`.
///
/// Whitespace and surrounding single quotes are trimmed, empty entries and
/// repeats are dropped.
pub fn parse_vehicle_types(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for part in text.split(';') {
        let name = part.trim().trim_matches('\'').trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foot_march_table() -> AttributeTable {
        AttributeTable::parse_json(
            "FootMarch",
            r#"[
                {"visibility": "Day", "maxmph": 5.0, "onslope": 15.0},
                {"visibility": "night", "maxmph": 2.5, "onslope": 10.0}
            ]"#,
        )
        .unwrap()
    }

    fn vehicle_table() -> AttributeTable {
        AttributeTable::parse_json(
            "Vehicles",
            r#"[
                {"name": "Heavy", "weight": 60, "maxkph": 60, "onslope": 20, "offslope": 10},
                {"name": "Light", "weight": 5, "maxkph": 100, "onslope": 40, "offslope": 30},
                {"name": "Other", "weight": 1, "maxkph": 1, "onslope": 1, "offslope": 1}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_visibility_from_str() {
        assert_eq!("DAY".parse::<Visibility>().unwrap(), Visibility::Day);
        assert_eq!(" night ".parse::<Visibility>().unwrap(), Visibility::Night);
        assert!(matches!("dusk".parse::<Visibility>(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_resolve_foot_march() {
        let day = resolve_foot_march(&foot_march_table(), Visibility::Day, MatchPolicy::Strict).unwrap();
        assert_eq!(day, FootMarchParameters { max_speed_mph: 5.0, max_slope_percent: 15.0 });

        let night = resolve_foot_march(&foot_march_table(), Visibility::Night, MatchPolicy::Strict).unwrap();
        assert_eq!(night.max_slope_percent, 10.0);
    }

    #[test]
    fn test_foot_march_not_found() {
        let table = AttributeTable::parse_json("FootMarch", r#"[{"visibility": "Day", "maxmph": 5, "onslope": 15}]"#).unwrap();
        let err = resolve_foot_march(&table, Visibility::Night, MatchPolicy::Strict).unwrap_err();
        assert!(matches!(err, Error::ParameterNotFound { .. }));
    }

    #[test]
    fn test_foot_march_ambiguous() {
        let table = AttributeTable::parse_json(
            "FootMarch",
            r#"[
                {"visibility": "Day", "maxmph": 5, "onslope": 15},
                {"visibility": "Day", "maxmph": 4, "onslope": 12}
            ]"#,
        )
        .unwrap();

        let err = resolve_foot_march(&table, Visibility::Day, MatchPolicy::Strict).unwrap_err();
        assert!(matches!(err, Error::AmbiguousParameter { matches: 2, .. }));

        let last = resolve_foot_march(&table, Visibility::Day, MatchPolicy::LastWins).unwrap();
        assert_eq!(last.max_slope_percent, 12.0);
    }

    #[test]
    fn test_foot_march_missing_column() {
        let table = AttributeTable::parse_json("FootMarch", r#"[{"visibility": "Day", "maxmph": 5}]"#).unwrap();
        let err = resolve_foot_march(&table, Visibility::Day, MatchPolicy::Strict).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("onslope")));
    }

    #[test]
    fn test_convoy_takes_least_capable() {
        let names = vec!["Heavy".to_string(), "Light".to_string()];
        let convoy = resolve_vehicle_convoy(&vehicle_table(), &names).unwrap();
        assert_eq!(convoy.min_weight, 5.0);
        assert_eq!(convoy.max_weight, 60.0);
        assert_eq!(convoy.max_speed_kph, 60.0);
        assert_eq!(convoy.on_road_slope_percent, 20.0);
        assert_eq!(convoy.off_road_slope_percent, 10.0);
    }

    #[test]
    fn test_convoy_unknown_names() {
        let names = vec!["Light".to_string(), "Ghost".to_string()];
        let convoy = resolve_vehicle_convoy(&vehicle_table(), &names).unwrap();
        assert_eq!(convoy.max_weight, 5.0);

        let err = resolve_vehicle_convoy(&vehicle_table(), &["Ghost".to_string()]).unwrap_err();
        assert!(matches!(err, Error::ParameterNotFound { .. }));

        let err = resolve_vehicle_convoy(&vehicle_table(), &[]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_parse_vehicle_types() {
        assert_eq!(
            parse_vehicle_types("'M1A1 Abrams'; 'HMMWV' ;;'M1A1 Abrams'"),
            vec!["M1A1 Abrams".to_string(), "HMMWV".to_string()]
        );
        assert!(parse_vehicle_types(" ; ").is_empty());
    }
}
