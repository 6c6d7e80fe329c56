use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::colors::parse_hex_color;
use crate::geometry::Boundary;

pub const UNKNOWN_TERRITORY_NAME: &str = "Unknown Territory";
pub const UNKNOWN_TERRITORY_COLOR: &str = "#CCCCCC";
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("malformed atlas json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empire with empty id")]
    EmptyId,
    #[error("duplicate empire id '{0}'")]
    DuplicateId(String),
    #[error("empire '{id}' has inverted years {min}..{max}")]
    InvertedYears { id: String, min: i32, max: i32 },
    #[error("empire '{0}' has no boundary snapshots")]
    NoBoundaries(String),
    #[error("empire '{id}' has invalid color '{value}'")]
    InvalidColor { id: String, value: String },
}

/// Inclusive year interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.min <= year && year <= self.max
    }

    pub fn clamp(&self, year: i32) -> i32 {
        year.clamp(self.min, self.max.max(self.min))
    }
}

/// A named period of an empire's history with its own ruler and, optionally, its own palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Era {
    pub from: i32,
    pub to: i32,
    pub name: String,
    pub ruler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Era {
    pub fn contains(&self, year: i32) -> bool {
        self.from <= year && year <= self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Empire {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub english_name: String,
    #[serde(default)]
    pub wiki_slug: Option<String>,
    pub color: String,
    pub border_color: String,
    pub valid_years: YearRange,
    /// Snapshot year -> boundary. Snapshot years need not fall inside `valid_years`.
    pub boundaries: BTreeMap<i32, Boundary>,
    #[serde(default)]
    pub eras: Vec<Era>,
}

impl Empire {
    /// Latest snapshot year at or before `year`, else the earliest snapshot.
    pub fn snapshot_year_for(&self, year: i32) -> Option<i32> {
        self.boundaries
            .range(..=year)
            .next_back()
            .or_else(|| self.boundaries.iter().next())
            .map(|(snapshot, _)| *snapshot)
    }

    pub fn boundary_for(&self, year: i32) -> Option<(i32, &Boundary)> {
        let snapshot = self.snapshot_year_for(year)?;
        self.boundaries.get(&snapshot).map(|b| (snapshot, b))
    }

    pub fn era_at(&self, year: i32) -> Option<&Era> {
        self.eras.iter().find(|era| era.contains(year))
    }

    /// Fill color as RGB, falling back to the id-derived color when unparseable.
    pub fn color_rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.color).unwrap_or_else(|| crate::colors::empire_color(&self.id))
    }

    pub fn border_rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.border_color).unwrap_or_else(|| self.color_rgb())
    }

    pub fn wiki_slug(&self) -> &str {
        self.wiki_slug.as_deref().unwrap_or(&self.id)
    }

    fn validate(&self) -> Result<(), AtlasError> {
        if self.id.trim().is_empty() {
            return Err(AtlasError::EmptyId);
        }
        if self.valid_years.min > self.valid_years.max {
            return Err(AtlasError::InvertedYears {
                id: self.id.clone(),
                min: self.valid_years.min,
                max: self.valid_years.max,
            });
        }
        if self.boundaries.is_empty() {
            return Err(AtlasError::NoBoundaries(self.id.clone()));
        }
        let era_colors = self.eras.iter().filter_map(|era| era.color.as_deref());
        for value in [self.color.as_str(), self.border_color.as_str()]
            .into_iter()
            .chain(era_colors)
        {
            if parse_hex_color(value).is_none() {
                return Err(AtlasError::InvalidColor {
                    id: self.id.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// An empire visible in a given year together with the boundary snapshot chosen for it.
#[derive(Debug, Clone, Copy)]
pub struct ActiveTerritory<'a> {
    pub empire: &'a Empire,
    pub boundary_year: i32,
    pub boundary: &'a Boundary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryInfo {
    pub id: String,
    pub name: String,
    pub ruler: String,
    pub era: String,
    pub color: String,
}

impl TerritoryInfo {
    fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: UNKNOWN_TERRITORY_NAME.to_string(),
            ruler: UNKNOWN.to_string(),
            era: UNKNOWN.to_string(),
            color: UNKNOWN_TERRITORY_COLOR.to_string(),
        }
    }
}

/// Identity of an active set: ids with their selected snapshot years, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ActiveSetKey(Vec<(String, i32)>);

impl ActiveSetKey {
    pub fn from_active(active: &[ActiveTerritory<'_>]) -> Self {
        Self::from_pairs(
            active
                .iter()
                .map(|t| (t.empire.id.clone(), t.boundary_year)),
        )
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, i32)>) -> Self {
        let mut pairs: Vec<_> = pairs.into_iter().collect();
        pairs.sort();
        pairs.dedup();
        Self(pairs)
    }

    pub fn entries(&self) -> &[(String, i32)] {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AtlasFile {
    empires: Vec<Empire>,
}

/// Every empire known to the map, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atlas {
    empires: BTreeMap<String, Empire>,
}

impl Atlas {
    pub fn from_json(raw: &str) -> Result<Self, AtlasError> {
        let file: AtlasFile = serde_json::from_str(raw)?;
        Self::from_empires(file.empires)
    }

    pub fn from_empires(empires: impl IntoIterator<Item = Empire>) -> Result<Self, AtlasError> {
        let mut map = BTreeMap::new();
        for empire in empires {
            empire.validate()?;
            if map.contains_key(&empire.id) {
                return Err(AtlasError::DuplicateId(empire.id));
            }
            map.insert(empire.id.clone(), empire);
        }
        Ok(Self { empires: map })
    }

    pub fn to_json(&self) -> Result<String, AtlasError> {
        let file = AtlasFile {
            empires: self.empires.values().cloned().collect(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    pub fn get(&self, id: &str) -> Option<&Empire> {
        self.empires.get(id)
    }

    pub fn empires(&self) -> impl Iterator<Item = &Empire> {
        self.empires.values()
    }

    pub fn len(&self) -> usize {
        self.empires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.empires.is_empty()
    }

    pub fn active_set(&self, year: i32) -> Vec<ActiveTerritory<'_>> {
        self.empires
            .values()
            .filter(|empire| empire.valid_years.contains(year))
            .filter_map(|empire| {
                let (boundary_year, boundary) = empire.boundary_for(year)?;
                Some(ActiveTerritory {
                    empire,
                    boundary_year,
                    boundary,
                })
            })
            .collect()
    }

    pub fn territory_info(&self, id: &str, year: i32) -> TerritoryInfo {
        let Some(empire) = self.get(id) else {
            return TerritoryInfo::unknown(id);
        };
        match empire.era_at(year) {
            Some(era) => TerritoryInfo {
                id: empire.id.clone(),
                name: era.display_name.clone().unwrap_or_else(|| empire.name.clone()),
                ruler: era.ruler.clone(),
                era: era.name.clone(),
                color: era.color.clone().unwrap_or_else(|| empire.color.clone()),
            },
            None => TerritoryInfo {
                id: empire.id.clone(),
                name: empire.name.clone(),
                ruler: UNKNOWN.to_string(),
                era: UNKNOWN.to_string(),
                color: empire.color.clone(),
            },
        }
    }

    /// Earliest start and latest end across all empires.
    pub fn year_bounds(&self) -> Option<YearRange> {
        let min = self.empires.values().map(|e| e.valid_years.min).min()?;
        let max = self.empires.values().map(|e| e.valid_years.max).max()?;
        Some(YearRange::new(min, max))
    }
}
