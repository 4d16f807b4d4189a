//! The tracker state machine.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{TrackerError, TrackerOptions, TrackerStatus};
use crate::catalog::{
    query_catalog, reconcile_granules, remove_stale_snapshot, Boundary, CatalogClient,
    CatalogQuery,
};
use crate::config::{Config, TrackingMode};
use crate::granule::{short_id, Granule, UnitKey, UnitStatus, WorkUnit};
use crate::metrics;
use crate::pairing::{build_sequential_pairs, ConnectivityReport};
use crate::scanner::{scan_pair_spans, scan_paired_products, scan_single_products};
use crate::store::{merge_preserving_status, JsonFileStore, WorkUnitStore};

/// Remote job name for a unit: `<prefix>_<unit key>`.
pub fn job_name(prefix: &str, unit: &WorkUnit) -> String {
    format!("{}_{}", prefix, unit.key())
}

async fn wait_for_store(store: &dyn WorkUnitStore) {
    let delay = store.save_delay();
    if !delay.is_zero() {
        debug!("Waiting {:?} for snapshot save spacing", delay);
        tokio::time::sleep(delay).await;
    }
}

/// Tracks every work unit for one area of interest.
pub struct Tracker {
    options: TrackerOptions,
    /// Known scenes in discovery order. Only ever appended to.
    granules: Vec<Granule>,
    units: Vec<WorkUnit>,
    store: Arc<dyn WorkUnitStore>,
}

impl Tracker {
    /// Opens the tracker described by `config`.
    ///
    /// Loads the boundary, builds the catalog query and the snapshot store,
    /// then runs [`Tracker::start`].
    pub async fn open(config: &Config, catalog: &dyn CatalogClient) -> Result<Self, TrackerError> {
        let boundary = Boundary::from_geojson_file(&config.catalog.boundary_path)?;
        let query = CatalogQuery::from_config(&config.catalog, boundary.to_catalog_polygon())?;
        let store = JsonFileStore::new(&config.tracker.state_file).with_min_interval(
            Duration::from_millis(config.tracker.min_save_interval_ms),
        );

        Self::start(
            TrackerOptions::from_config(&config.tracker),
            Arc::new(store),
            catalog,
            &query,
        )
        .await
    }

    /// Runs the startup sequence.
    ///
    /// 1. Load the persisted snapshot.
    /// 2. Drop any stale catalog snapshot and query the catalog.
    /// 3. Merge the catalog results in without downgrading any status.
    /// 4. Promote units with local products to `localized`.
    ///
    /// A catalog failure aborts startup.
    pub async fn start(
        options: TrackerOptions,
        store: Arc<dyn WorkUnitStore>,
        catalog: &dyn CatalogClient,
        query: &CatalogQuery,
    ) -> Result<Self, TrackerError> {
        let persisted = store.load()?;
        info!("Loaded {} persisted units", persisted.len());

        if let Some(path) = &options.catalog_snapshot {
            remove_stale_snapshot(path).await?;
        }
        let fetched = query_catalog(catalog, query, options.catalog_snapshot.as_deref()).await?;

        wait_for_store(store.as_ref()).await;
        let mut tracker = Self::assemble(options, store, persisted, fetched)?;
        tracker.save_ready().await;
        let promoted = tracker.refresh_local()?;
        info!(
            "Tracker ready ({} promoted from local products): {}",
            promoted,
            tracker.status()
        );
        Ok(tracker)
    }

    /// Restores a tracker from its snapshot and an already-known scene list.
    ///
    /// Neither the catalog nor local storage is consulted.
    pub fn from_granules(
        options: TrackerOptions,
        store: Arc<dyn WorkUnitStore>,
        granules: Vec<Granule>,
    ) -> Result<Self, TrackerError> {
        let persisted = store.load()?;
        Self::assemble(options, store, persisted, granules)
    }

    fn assemble(
        options: TrackerOptions,
        store: Arc<dyn WorkUnitStore>,
        persisted: Vec<WorkUnit>,
        fetched: Vec<Granule>,
    ) -> Result<Self, TrackerError> {
        let mut tracker = Self {
            options,
            granules: Vec::new(),
            units: Vec::new(),
            store,
        };
        tracker.reconcile(persisted, fetched);
        tracker.persist()?;
        Ok(tracker)
    }

    fn reconcile(&mut self, persisted: Vec<WorkUnit>, fetched: Vec<Granule>) {
        let added = reconcile_granules(&mut self.granules, fetched);
        debug!("{} scenes from the catalog", added);

        let incoming: Vec<WorkUnit> = match self.options.mode {
            TrackingMode::Single => self.granules.iter().cloned().map(WorkUnit::from).collect(),
            TrackingMode::Pair => build_sequential_pairs(&self.granules)
                .into_iter()
                .map(WorkUnit::from)
                .collect(),
        };

        let wanted = match self.options.mode {
            TrackingMode::Single => "granule",
            TrackingMode::Pair => "granule_pair",
        };
        let (kept, dropped): (Vec<WorkUnit>, Vec<WorkUnit>) =
            persisted.into_iter().partition(|u| u.kind() == wanted);
        if !dropped.is_empty() {
            warn!(
                "Dropping {} persisted units that do not match {:?} mode",
                dropped.len(),
                self.options.mode
            );
        }

        // Persisted units may name scenes the catalog no longer returns.
        let leftovers: Vec<Granule> = kept
            .iter()
            .flat_map(|u| u.granules().into_iter().cloned())
            .collect();
        let orphaned = reconcile_granules(&mut self.granules, leftovers);
        if orphaned > 0 {
            warn!("{} persisted scenes are missing from the catalog", orphaned);
        }

        let before = kept.len();
        self.units = merge_preserving_status(&kept, &incoming);
        info!(
            "Tracking {} units ({} new, {} scenes)",
            self.units.len(),
            self.units.len() - before,
            self.granules.len()
        );
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn mode(&self) -> TrackingMode {
        self.options.mode
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// All tracked units, in tracking order.
    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// All known scenes, in discovery order.
    pub fn granules(&self) -> &[Granule] {
        &self.granules
    }

    pub fn get(&self, key: &UnitKey) -> Option<&WorkUnit> {
        self.units.iter().find(|u| &u.key() == key)
    }

    fn position(&self, key: &UnitKey) -> Option<usize> {
        self.units.iter().position(|u| &u.key() == key)
    }

    fn with_status(&self, status: UnitStatus) -> Vec<WorkUnit> {
        self.units
            .iter()
            .filter(|u| u.status() == status)
            .cloned()
            .collect()
    }

    /// Units waiting for submission (`unknown` or `unsubmitted`), in order.
    pub fn unsubmitted(&self) -> Vec<WorkUnit> {
        self.units
            .iter()
            .filter(|u| u.status().is_pending())
            .cloned()
            .collect()
    }

    pub fn submitted(&self) -> Vec<WorkUnit> {
        self.with_status(UnitStatus::Submitted)
    }

    pub fn failed(&self) -> Vec<WorkUnit> {
        self.with_status(UnitStatus::Failed)
    }

    pub fn localized(&self) -> Vec<WorkUnit> {
        self.with_status(UnitStatus::Localized)
    }

    pub fn blacklisted(&self) -> Vec<WorkUnit> {
        self.with_status(UnitStatus::Blacklisted)
    }

    /// The next units to submit without exceeding `ceiling` jobs in flight.
    pub fn select_for_submission(&self, ceiling: usize) -> Vec<WorkUnit> {
        let in_flight = self
            .units
            .iter()
            .filter(|u| u.status() == UnitStatus::Submitted)
            .count();
        let slots = ceiling.saturating_sub(in_flight);

        self.units
            .iter()
            .filter(|u| u.status().is_pending())
            .take(slots)
            .cloned()
            .collect()
    }

    /// True once no unit is waiting or in flight.
    pub fn is_complete(&self) -> bool {
        !self.units.iter().any(|u| u.status().is_open())
    }

    /// Whether a scene with this name's id is known. Only the 4-character
    /// id is compared, so distinct scenes sharing an id are not told apart.
    pub fn is_known_name(&self, name: &str) -> bool {
        let id = short_id(name);
        self.granules.iter().any(|g| g.id == id)
    }

    pub fn status(&self) -> TrackerStatus {
        TrackerStatus::from_units(self.options.mode, &self.units)
    }

    /// Date-chain check over the pair products currently on disk.
    pub fn connectivity_report(&self) -> ConnectivityReport {
        ConnectivityReport::new(scan_pair_spans(&self.options.scan_dir))
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Records a submitted job. Returns `Ok(false)` if the unit is unknown
    /// or already finished.
    pub fn mark_submitted(
        &mut self,
        unit: &WorkUnit,
        job_id: impl Into<String>,
    ) -> Result<bool, TrackerError> {
        let changed = self.transition(unit, UnitStatus::Submitted, Some(job_id.into()))?;
        if changed {
            metrics::SUBMISSIONS_TOTAL.inc();
        }
        Ok(changed)
    }

    pub fn mark_failed(&mut self, unit: &WorkUnit) -> Result<bool, TrackerError> {
        let changed = self.transition(unit, UnitStatus::Failed, None)?;
        if changed {
            metrics::JOB_OUTCOMES.with_label_values(&["failed"]).inc();
        }
        Ok(changed)
    }

    pub fn mark_localized(&mut self, unit: &WorkUnit) -> Result<bool, TrackerError> {
        let changed = self.transition(unit, UnitStatus::Localized, None)?;
        if changed {
            metrics::JOB_OUTCOMES.with_label_values(&["localized"]).inc();
        }
        Ok(changed)
    }

    /// Operator override. Blacklisted units are never touched again.
    pub fn mark_blacklisted(&mut self, unit: &WorkUnit) -> Result<bool, TrackerError> {
        self.transition(unit, UnitStatus::Blacklisted, None)
    }

    fn transition(
        &mut self,
        unit: &WorkUnit,
        to: UnitStatus,
        job_id: Option<String>,
    ) -> Result<bool, TrackerError> {
        let key = unit.key();
        let Some(idx) = self.position(&key) else {
            warn!("Ignoring {} for untracked unit {}", to, key);
            return Ok(false);
        };

        let from = self.units[idx].status();
        if !from.can_transition_to(to) {
            warn!("Ignoring transition {} -> {} for {}", from, to, key);
            return Ok(false);
        }

        let previous = self.units.clone();
        let mut updated = self.units[idx].clone();
        updated.set_status(to);
        if job_id.is_some() {
            updated.set_job_id(job_id);
        }
        self.replace(idx, updated, to);

        if let Err(e) = self.persist() {
            self.units = previous;
            return Err(e);
        }
        info!("{}: {} -> {}", key, from, to);
        Ok(true)
    }

    /// Localized units move to the end; everything else is updated in place.
    fn replace(&mut self, idx: usize, unit: WorkUnit, to: UnitStatus) {
        if to == UnitStatus::Localized {
            self.units.remove(idx);
            self.units.push(unit);
        } else {
            self.units[idx] = unit;
        }
    }

    /// Rescans local storage and promotes units whose products are present.
    ///
    /// Returns how many units were promoted. Products for unknown scenes
    /// and units that are already localized or blacklisted are left alone.
    pub fn refresh_local(&mut self) -> Result<usize, TrackerError> {
        let found: Vec<WorkUnit> = match self.options.mode {
            TrackingMode::Single => {
                let known: HashSet<&str> = self.granules.iter().map(|g| g.id.as_str()).collect();
                scan_single_products(&self.options.scan_dir)
                    .into_iter()
                    .filter_map(|scanned| {
                        if !known.contains(scanned.id.as_str()) {
                            debug!("Ignoring local product for unknown scene {}", scanned.name);
                            return None;
                        }
                        self.granules
                            .iter()
                            .find(|g| g.id == scanned.id)
                            .map(|g| WorkUnit::from(g.clone().with_status(UnitStatus::Localized)))
                    })
                    .collect()
            }
            TrackingMode::Pair => scan_paired_products(&self.options.scan_dir, &self.granules)
                .into_iter()
                .map(WorkUnit::from)
                .collect(),
        };

        let previous = self.units.clone();
        let mut promoted = 0;
        for unit in found {
            let key = unit.key();
            match self.position(&key) {
                Some(idx) => {
                    let from = self.units[idx].status();
                    if !from.can_transition_to(UnitStatus::Localized) {
                        continue;
                    }
                    let mut updated = self.units[idx].clone();
                    updated.set_status(UnitStatus::Localized);
                    self.replace(idx, updated, UnitStatus::Localized);
                    info!("{}: {} -> localized (local product)", key, from);
                }
                None => {
                    self.units.push(unit);
                    info!("{}: tracked from local product", key);
                }
            }
            promoted += 1;
        }

        if promoted > 0 {
            if let Err(e) = self.persist() {
                self.units = previous;
                return Err(e);
            }
        }
        Ok(promoted)
    }

    /// Waits until the store accepts a save without blocking.
    ///
    /// Call before any transition from async code.
    pub async fn save_ready(&self) {
        wait_for_store(self.store.as_ref()).await;
    }

    fn persist(&self) -> Result<(), TrackerError> {
        self.store.save(&self.units)?;
        let status = self.status();
        metrics::set_unit_counts(&[
            (UnitStatus::Unsubmitted, status.unsubmitted),
            (UnitStatus::Submitted, status.submitted),
            (UnitStatus::Localized, status.localized),
            (UnitStatus::Failed, status.failed),
            (UnitStatus::Blacklisted, status.blacklisted),
        ]);
        Ok(())
    }
}
