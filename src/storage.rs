//! Persistence for schedule maps and practice records.
//!
//! Schedules are saved wholesale: one JSON object per language mapping card
//! id to schedule, overwritten on every save. Loading is deliberately
//! forgiving, a damaged entry (or a damaged file) costs that data and
//! nothing else; the card just counts as new again.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::models::PracticeLanguage;
use crate::scheduler::{CardSchedule, ScheduleMap};

/// Whole-map persistence for per-language schedules.
///
/// `load` must tolerate malformed entries by dropping them instead of
/// failing the map. Implementations are shared across threads by the save
/// worker.
pub trait ScheduleStore: Send + Sync {
    fn load(&self, language: PracticeLanguage) -> Result<ScheduleMap>;
    fn save(&self, language: PracticeLanguage, schedules: &ScheduleMap) -> Result<()>;
}

/// File-backed store: `schedules-<lang>.json` under a data directory.
pub struct JsonScheduleStore {
    data_dir: PathBuf,
}

impl JsonScheduleStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
        Ok(Self { data_dir })
    }

    /// Get default storage location.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vocadeck")
    }

    fn schedule_path(&self, language: PracticeLanguage) -> PathBuf {
        self.data_dir
            .join(format!("schedules-{}.json", language.code()))
    }

    fn records_path(&self, language: PracticeLanguage) -> PathBuf {
        self.data_dir
            .join(format!("records-{}.json", language.code()))
    }

    /// Load the practice records for a language, empty if absent or damaged.
    pub fn load_records(&self, language: PracticeLanguage) -> Result<PracticeRecords> {
        let path = self.records_path(language);
        if !path.exists() {
            return Ok(PracticeRecords::default());
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read records: {:?}", path))?;
        match serde_json::from_str(&json) {
            Ok(records) => Ok(records),
            Err(e) => {
                log::warn!("Records file {:?} is unreadable, starting fresh: {}", path, e);
                Ok(PracticeRecords::default())
            }
        }
    }

    pub fn save_records(&self, language: PracticeLanguage, records: &PracticeRecords) -> Result<()> {
        let path = self.records_path(language);
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&path, json).with_context(|| format!("Failed to write records: {:?}", path))?;
        Ok(())
    }
}

impl ScheduleStore for JsonScheduleStore {
    fn load(&self, language: PracticeLanguage) -> Result<ScheduleMap> {
        let path = self.schedule_path(language);
        if !path.exists() {
            return Ok(ScheduleMap::new());
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read schedules: {:?}", path))?;
        let raw: HashMap<String, serde_json::Value> = match serde_json::from_str(&json) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Schedule file {:?} is unreadable, starting fresh: {}", path, e);
                return Ok(ScheduleMap::new());
            }
        };

        // Per-entry parse: one bad entry must not take the map down with it.
        let mut map = ScheduleMap::new();
        for (id, value) in raw {
            match serde_json::from_value::<CardSchedule>(value) {
                Ok(schedule) if schedule.is_valid() => {
                    map.insert(id, schedule);
                }
                Ok(_) => log::warn!("Dropping out-of-range schedule for card {}", id),
                Err(e) => log::warn!("Dropping malformed schedule for card {}: {}", id, e),
            }
        }
        Ok(map)
    }

    fn save(&self, language: PracticeLanguage, schedules: &ScheduleMap) -> Result<()> {
        let path = self.schedule_path(language);
        let json = serde_json::to_string_pretty(schedules)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write schedules: {:?}", path))?;
        Ok(())
    }
}

/// In-memory store for tests and simulations.
#[derive(Default)]
pub struct MemoryScheduleStore {
    maps: Mutex<HashMap<PracticeLanguage, ScheduleMap>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn load(&self, language: PracticeLanguage) -> Result<ScheduleMap> {
        let maps = self
            .maps
            .lock()
            .map_err(|_| anyhow!("schedule store poisoned"))?;
        Ok(maps.get(&language).cloned().unwrap_or_default())
    }

    fn save(&self, language: PracticeLanguage, schedules: &ScheduleMap) -> Result<()> {
        let mut maps = self
            .maps
            .lock()
            .map_err(|_| anyhow!("schedule store poisoned"))?;
        maps.insert(language, schedules.clone());
        Ok(())
    }
}

/// Long-lived per-language trophies: how many runs happened and the fastest
/// full clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeRecords {
    pub runs_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_clear_ms: Option<i64>,
}

impl PracticeRecords {
    /// Fold one finished run in. Returns true when the clear time set a new
    /// best.
    pub fn record_run(&mut self, clear_time: Option<chrono::Duration>) -> bool {
        self.runs_count += 1;
        if let Some(t) = clear_time {
            let ms = t.num_milliseconds();
            if self.best_clear_ms.map_or(true, |best| ms < best) {
                self.best_clear_ms = Some(ms);
                return true;
            }
        }
        false
    }
}
