use serde::{Deserialize, Serialize};

use crate::placement::LabelPlacement;

/// One row of `GET /api/active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEntry {
    pub id: String,
    pub name: String,
    pub color: String,
    pub era: String,
    pub ruler: String,
    pub boundary_year: i32,
    pub placement: LabelPlacement,
}

/// Sanitized Wikipedia summary returned by `GET /api/wiki/{slug}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiSummary {
    pub title: String,
    pub html: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WikiLang {
    #[default]
    En,
    Id,
}

impl WikiLang {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "id" => Some(Self::Id),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Id => "id",
        }
    }
}
