//! Work unit model: catalog scenes, scene pairs, and their tracking status.

mod name;
mod types;

pub use name::{scene_date_from_name, short_id, strip_safe_suffix, SCENE_NAME_LEN};
pub use types::{Granule, GranulePair, UnitKey, UnitStatus, WorkUnit};
