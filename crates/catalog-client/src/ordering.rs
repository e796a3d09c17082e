//! Priority ordering of resolved sources.

use std::cmp::Ordering;

use chip_common::SourceDescriptor;
use serde::{Deserialize, Serialize};

/// Which source wins where several overlap.
///
/// The compositor takes sources in the order given, so the first source in
/// the ordered list has the highest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrdering {
    /// Most recent acquisition first; ties go to the finer resolution.
    #[default]
    NewestFirst,
    /// Finest resolution first; ties go to the more recent acquisition.
    FinestFirst,
}

impl SourceOrdering {
    /// Parse from string (case-insensitive). Unknown values fall back to
    /// the default.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "finest_first" | "finest" | "resolution" => Self::FinestFirst,
            _ => Self::NewestFirst,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewestFirst => "newest_first",
            Self::FinestFirst => "finest_first",
        }
    }

    /// Sort `sources` into priority order. The sort is stable.
    pub fn apply(&self, sources: &mut [SourceDescriptor]) {
        match self {
            Self::NewestFirst => {
                sources.sort_by(|a, b| newest(a, b).then_with(|| finest(a, b)));
            }
            Self::FinestFirst => {
                sources.sort_by(|a, b| finest(a, b).then_with(|| newest(a, b)));
            }
        }
    }
}

impl std::fmt::Display for SourceOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Later datetimes first; undated sources last.
fn newest(a: &SourceDescriptor, b: &SourceDescriptor) -> Ordering {
    match (a.datetime, b.datetime) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn finest(a: &SourceDescriptor, b: &SourceDescriptor) -> Ordering {
    a.resolution.total_cmp(&b.resolution)
}
