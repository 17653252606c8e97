//! Background schedule saving.
//!
//! Review grading updates the in-memory map synchronously; durability runs
//! behind it on a dedicated writer thread. One worker serializes all writes,
//! and bursts of snapshots coalesce down to the newest per language, so save
//! completions can never land out of order and a rapid run of answers costs
//! one write, not ten.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::models::PracticeLanguage;
use crate::scheduler::ScheduleMap;
use crate::storage::ScheduleStore;

enum SaveMessage {
    Snapshot(PracticeLanguage, ScheduleMap),
    Flush(Sender<()>),
    Shutdown,
}

/// Handle to the writer thread. Dropping it flushes whatever is queued and
/// joins the thread.
pub struct ScheduleSaver {
    sender: Sender<SaveMessage>,
    worker: Option<JoinHandle<()>>,
}

impl ScheduleSaver {
    pub fn spawn(store: Arc<dyn ScheduleStore>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let worker = std::thread::spawn(move || run_worker(store, receiver));
        Self {
            sender,
            worker: Some(worker),
        }
    }

    /// Queue a whole-map snapshot for writing. Never blocks and never fails
    /// the caller; a dead worker just means the write is lost, which is the
    /// same deal as a failed write.
    pub fn submit(&self, language: PracticeLanguage, snapshot: ScheduleMap) {
        let _ = self.sender.send(SaveMessage::Snapshot(language, snapshot));
    }

    /// Block until everything queued ahead of this call has been written.
    /// Session start uses this so a store reload never races the writer.
    pub fn flush(&self) {
        let (ack, done) = mpsc::channel();
        if self.sender.send(SaveMessage::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

impl Drop for ScheduleSaver {
    fn drop(&mut self) {
        let _ = self.sender.send(SaveMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(store: Arc<dyn ScheduleStore>, receiver: Receiver<SaveMessage>) {
    loop {
        let Ok(first) = receiver.recv() else {
            return;
        };

        let mut pending: HashMap<PracticeLanguage, ScheduleMap> = HashMap::new();
        let mut acks: Vec<Sender<()>> = Vec::new();
        let mut shutdown = false;
        absorb(first, &mut pending, &mut acks, &mut shutdown);
        // Coalesce whatever queued up behind it; only the newest snapshot
        // per language is worth writing.
        while let Ok(more) = receiver.try_recv() {
            absorb(more, &mut pending, &mut acks, &mut shutdown);
        }

        for (language, snapshot) in pending {
            if let Err(e) = store.save(language, &snapshot) {
                log::warn!("Failed to save {} schedules: {:#}", language.code(), e);
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }

        if shutdown {
            return;
        }
    }
}

fn absorb(
    message: SaveMessage,
    pending: &mut HashMap<PracticeLanguage, ScheduleMap>,
    acks: &mut Vec<Sender<()>>,
    shutdown: &mut bool,
) {
    match message {
        SaveMessage::Snapshot(language, snapshot) => {
            pending.insert(language, snapshot);
        }
        SaveMessage::Flush(ack) => acks.push(ack),
        SaveMessage::Shutdown => *shutdown = true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::CardSchedule;
    use crate::storage::MemoryScheduleStore;
    use anyhow::{bail, Result};
    use chrono::Utc;

    fn snapshot(ids: &[&str]) -> ScheduleMap {
        ids.iter()
            .map(|id| (id.to_string(), CardSchedule::new(Utc::now())))
            .collect()
    }

    #[test]
    fn snapshots_are_written_before_the_handle_drops() {
        let store = Arc::new(MemoryScheduleStore::new());
        {
            let saver = ScheduleSaver::spawn(store.clone());
            saver.submit(PracticeLanguage::Pt, snapshot(&["a"]));
            saver.submit(PracticeLanguage::Fr, snapshot(&["b", "c"]));
        }

        assert_eq!(store.load(PracticeLanguage::Pt).unwrap().len(), 1);
        assert_eq!(store.load(PracticeLanguage::Fr).unwrap().len(), 2);
    }

    #[test]
    fn flush_blocks_until_writes_land() {
        let store = Arc::new(MemoryScheduleStore::new());
        let saver = ScheduleSaver::spawn(store.clone());

        saver.submit(PracticeLanguage::Pt, snapshot(&["a", "b"]));
        saver.flush();

        assert_eq!(store.load(PracticeLanguage::Pt).unwrap().len(), 2);
    }

    #[test]
    fn newest_snapshot_wins() {
        let store = Arc::new(MemoryScheduleStore::new());
        {
            let saver = ScheduleSaver::spawn(store.clone());
            for i in 0..10 {
                let ids: Vec<String> = (0..=i).map(|n| format!("card-{}", n)).collect();
                let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                saver.submit(PracticeLanguage::Pt, snapshot(&refs));
            }
        }

        let map = store.load(PracticeLanguage::Pt).unwrap();
        assert_eq!(map.len(), 10);
        assert!(map.contains_key("card-9"));
    }

    struct FailingStore;

    impl ScheduleStore for FailingStore {
        fn load(&self, _language: PracticeLanguage) -> Result<ScheduleMap> {
            Ok(ScheduleMap::new())
        }
        fn save(&self, _language: PracticeLanguage, _schedules: &ScheduleMap) -> Result<()> {
            bail!("disk on fire")
        }
    }

    #[test]
    fn save_failures_never_reach_the_caller() {
        let saver = ScheduleSaver::spawn(Arc::new(FailingStore));
        saver.submit(PracticeLanguage::Pt, snapshot(&["a"]));
        // Flush and drop both complete; the failure is logged and swallowed.
        saver.flush();
        drop(saver);
    }
}
