//! On-disk snapshot schema.
//!
//! Kept separate from the in-memory model so that the file format only
//! changes when `SNAPSHOT_VERSION` does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::granule::{Granule, GranulePair, UnitStatus, WorkUnit};

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub units: Vec<UnitRecord>,
}

impl Snapshot {
    pub fn from_units(units: &[WorkUnit]) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            units: units.iter().map(UnitRecord::from).collect(),
        }
    }

    pub fn into_units(self) -> Vec<WorkUnit> {
        self.units.into_iter().map(WorkUnit::from).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum UnitRecord {
    Granule(GranuleRecord),
    Pair {
        primary: GranuleRecord,
        secondary: GranuleRecord,
        status: UnitStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GranuleRecord {
    pub name: String,
    pub id: String,
    pub scene_date: DateTime<Utc>,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl From<&Granule> for GranuleRecord {
    fn from(g: &Granule) -> Self {
        Self {
            name: g.name.clone(),
            id: g.id.clone(),
            scene_date: g.scene_date,
            status: g.status,
            job_id: g.job_id.clone(),
        }
    }
}

impl From<GranuleRecord> for Granule {
    fn from(r: GranuleRecord) -> Self {
        Granule {
            name: r.name,
            id: r.id,
            scene_date: r.scene_date,
            status: r.status,
            job_id: r.job_id,
        }
    }
}

impl From<&WorkUnit> for UnitRecord {
    fn from(unit: &WorkUnit) -> Self {
        match unit {
            WorkUnit::Granule(g) => UnitRecord::Granule(g.into()),
            WorkUnit::Pair(p) => UnitRecord::Pair {
                primary: (&p.primary).into(),
                secondary: (&p.secondary).into(),
                status: p.status,
                job_id: p.job_id.clone(),
            },
        }
    }
}

impl From<UnitRecord> for WorkUnit {
    fn from(record: UnitRecord) -> Self {
        match record {
            UnitRecord::Granule(granule) => WorkUnit::Granule(granule.into()),
            UnitRecord::Pair {
                primary,
                secondary,
                status,
                job_id,
            } => WorkUnit::Pair(GranulePair {
                primary: primary.into(),
                secondary: secondary.into(),
                status,
                job_id,
            }),
        }
    }
}
