use std::sync::atomic::{AtomicUsize, Ordering};

use cadence_core::{PingFilter, ReminderKey, ReminderPatch};
use cadence_service::{
    JsonFileStore, MemoryStore, Mutation, ReminderQuery, ReminderService, ReminderStore, ServiceError,
    ServiceResult, Snapshot,
};
use chrono::{DateTime, TimeZone, Utc};

fn utc(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, h, mi, 0).unwrap()
}

fn id(key: u32) -> ReminderKey {
    ReminderKey { guild: 10, member: 20, key }
}

fn create_patch() -> ReminderPatch {
    ReminderPatch {
        channel: Some(555),
        timezone: Some("UTC".into()),
        cycles_per_day: Some(3),
        anchor_time: Some("22:00".into()),
        response_emotes: Some(Some("10,20,30".into())),
        ping_message: Some("Pills".into()),
        ..Default::default()
    }
}

fn service_with_reminder() -> ReminderService<MemoryStore> {
    let svc = ReminderService::new(MemoryStore::new());
    svc.put_reminder(id(1), &create_patch(), utc(1, 12, 0)).unwrap();
    svc
}

#[test]
fn first_report_resolves_against_bootstrap_slot() {
    let svc = service_with_reminder();
    let ack = svc.report_taken(id(1), Some(utc(2, 5, 0)), utc(2, 5, 0)).unwrap();
    assert_eq!(ack.center, utc(2, 6, 0));
    assert_eq!(ack.cycle, 0);
    assert_eq!(ack.emote, Some(10));
    assert_eq!(ack.message, "Nice");

    let ack = svc.report_taken(id(1), None, utc(2, 14, 20)).unwrap();
    assert_eq!(ack.center, utc(2, 14, 0));
    assert_eq!(ack.cycle, 1);
    assert_eq!(ack.emote, Some(20));
}

#[test]
fn report_rejects_future_and_out_of_order_times() {
    let svc = service_with_reminder();
    svc.report_taken(id(1), Some(utc(2, 5, 0)), utc(2, 6, 0)).unwrap();

    let err = svc.report_taken(id(1), Some(utc(2, 7, 0)), utc(2, 6, 0)).unwrap_err();
    assert!(err.is_invalid_input());
    assert!(err.to_string().contains("future"));

    let err = svc.report_taken(id(1), Some(utc(2, 4, 0)), utc(2, 6, 0)).unwrap_err();
    assert!(err.is_invalid_input());
    assert!(err.to_string().contains("before previously recorded"));

    let err = svc.report_taken(id(9), None, utc(2, 6, 0)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn undo_removes_newest_and_is_noop_when_empty() {
    let svc = service_with_reminder();
    assert_eq!(svc.undo_taken(id(1)).unwrap(), None);

    svc.report_taken(id(1), None, utc(2, 5, 0)).unwrap();
    svc.report_taken(id(1), None, utc(2, 14, 0)).unwrap();
    let undone = svc.undo_taken(id(1)).unwrap().unwrap();
    assert_eq!(undone.timestamp, utc(2, 14, 0));

    let snap = svc.store().snapshot(&id(1)).unwrap().unwrap();
    assert_eq!(snap.tail.len(), 1);
    assert_eq!(snap.tail[0].timestamp, utc(2, 5, 0));

    assert!(svc.undo_taken(id(9)).unwrap_err().is_not_found());
}

#[test]
fn alternating_flag_toggles_with_report_and_undo() {
    let svc = service_with_reminder();
    let patch = ReminderPatch {
        show_alternating: Some(Some("left,right".into())),
        ..Default::default()
    };
    svc.put_reminder(id(1), &patch, utc(1, 12, 0)).unwrap();

    let flag = |svc: &ReminderService<MemoryStore>| {
        svc.get_reminders(&ReminderQuery::exact(id(1))).unwrap()[0].alternating_flag
    };
    assert!(!flag(&svc));
    svc.report_taken(id(1), None, utc(2, 5, 0)).unwrap();
    assert!(flag(&svc));
    svc.undo_taken(id(1)).unwrap();
    assert!(!flag(&svc));
    // Nothing to undo: no toggle either.
    svc.undo_taken(id(1)).unwrap();
    assert!(!flag(&svc));
}

#[test]
fn ping_status_flags_filters_and_mark() {
    let svc = service_with_reminder();
    svc.report_taken(id(1), None, utc(2, 14, 20)).unwrap();

    // Target: 22:00 after correction, floored to the naive 22:20 once "now" passes it.
    let before = svc
        .ping_status(&ReminderQuery::default(), PingFilter::none(), utc(2, 21, 0))
        .unwrap();
    assert_eq!(before.len(), 1);
    assert!(!before[0].flag_due);
    assert_eq!(before[0].target.timestamp, utc(2, 22, 0));
    assert!(svc
        .ping_status(&ReminderQuery::default(), PingFilter::default(), utc(2, 21, 0))
        .unwrap()
        .is_empty());

    let due = svc
        .ping_status(&ReminderQuery::default(), PingFilter::default(), utc(2, 22, 30))
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].target.timestamp, utc(2, 22, 20));
    assert_eq!(due[0].message, "[1] Pills");
    assert!(due[0].flag_ping);

    svc.mark_pinged(id(1), utc(2, 22, 30)).unwrap();
    assert!(svc
        .ping_status(&ReminderQuery::default(), PingFilter::default(), utc(2, 22, 45))
        .unwrap()
        .is_empty());
    let again = svc
        .ping_status(&ReminderQuery::default(), PingFilter::default(), utc(2, 23, 0))
        .unwrap();
    assert_eq!(again.len(), 1);

    let mute = ReminderPatch {
        mute_until_utc: Some("2024-01-02T23:30:00Z".into()),
        ..Default::default()
    };
    svc.put_reminder(id(1), &mute, utc(2, 23, 0)).unwrap();
    let all = svc
        .ping_status(&ReminderQuery::default(), PingFilter::none(), utc(2, 23, 0))
        .unwrap();
    assert!(all[0].flag_muted);
    assert_eq!(all[0].muted.as_deref(), Some("Muted for another 30 minutes."));
    let only_due = PingFilter { due: true, muted: false, ping_due: false };
    assert_eq!(
        svc.ping_status(&ReminderQuery::default(), only_due, utc(2, 23, 0)).unwrap().len(),
        1
    );
}

#[test]
fn put_rejects_invalid_and_delete_removes() {
    let svc = service_with_reminder();
    let bad = ReminderPatch { cycles_per_day: Some(0), ..Default::default() };
    assert!(svc.put_reminder(id(1), &bad, utc(1, 12, 0)).unwrap_err().is_invalid_input());

    let missing_tz = ReminderPatch { channel: Some(1), ..Default::default() };
    assert!(svc.put_reminder(id(2), &missing_tz, utc(1, 12, 0)).unwrap_err().is_invalid_input());

    svc.delete_reminder(id(1)).unwrap();
    assert!(svc.get_reminders(&ReminderQuery::default()).unwrap().is_empty());
    assert!(svc.delete_reminder(id(1)).unwrap_err().is_not_found());
}

#[test]
fn oversized_windows_are_rejected_and_reminder_keeps_working() {
    let svc = service_with_reminder();
    for patch in [
        ReminderPatch { correction_secs: Some(9_000_000_000_000_000), ..Default::default() },
        ReminderPatch { ping_interval_secs: Some(9_000_000_000_000_000), ..Default::default() },
    ] {
        let err = svc.put_reminder(id(1), &patch, utc(1, 12, 0)).unwrap_err();
        assert!(err.is_invalid_input(), "{patch:?}");
    }

    let ack = svc.report_taken(id(1), None, utc(2, 5, 0)).unwrap();
    assert_eq!(ack.center, utc(2, 6, 0));
    let reports = svc
        .ping_status(&ReminderQuery::default(), PingFilter::none(), utc(3, 5, 0))
        .unwrap();
    assert_eq!(reports.len(), 1);
}

#[test]
fn json_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("reminders.json");

    {
        let svc = ReminderService::new(JsonFileStore::open(&path).unwrap());
        svc.put_reminder(id(1), &create_patch(), utc(1, 12, 0)).unwrap();
        svc.report_taken(id(1), None, utc(2, 5, 0)).unwrap();
    }

    let svc = ReminderService::new(JsonFileStore::open(&path).unwrap());
    let reminders = svc.get_reminders(&ReminderQuery { member: Some(20), ..Default::default() }).unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].ping_message, "Pills");
    let snap = svc.store().snapshot(&id(1)).unwrap().unwrap();
    assert_eq!(snap.tail[0].center, utc(2, 6, 0));
}

/// Sneaks a competing write in before the first `budget` commits.
struct RacingStore {
    inner: MemoryStore,
    budget: AtomicUsize,
}

impl ReminderStore for RacingStore {
    fn query(&self, query: &ReminderQuery) -> ServiceResult<Vec<Snapshot>> {
        self.inner.query(query)
    }

    fn snapshot(&self, id: &ReminderKey) -> ServiceResult<Option<Snapshot>> {
        self.inner.snapshot(id)
    }

    fn commit(&self, id: &ReminderKey, expected: Option<u64>, mutations: Vec<Mutation>) -> ServiceResult<u64> {
        let left = self.budget.load(Ordering::SeqCst);
        if left > 0 {
            self.budget.store(left - 1, Ordering::SeqCst);
            if let Some(snap) = self.inner.snapshot(id)? {
                self.inner
                    .commit(id, Some(snap.revision), vec![Mutation::Upsert(snap.reminder)])?;
            }
        }
        self.inner.commit(id, expected, mutations)
    }
}

fn racing(budget: usize) -> ReminderService<RacingStore> {
    let inner = MemoryStore::new();
    let svc = ReminderService::new(RacingStore { inner, budget: AtomicUsize::new(0) });
    svc.put_reminder(id(1), &create_patch(), utc(1, 12, 0)).unwrap();
    svc.store().budget.store(budget, Ordering::SeqCst);
    svc
}

#[test]
fn single_conflict_is_retried_transparently() {
    let svc = racing(1);
    let ack = svc.report_taken(id(1), None, utc(2, 5, 0)).unwrap();
    assert_eq!(ack.center, utc(2, 6, 0));
    let snap = svc.store().snapshot(&id(1)).unwrap().unwrap();
    assert_eq!(snap.tail.len(), 1);
}

#[test]
fn repeated_conflict_surfaces_as_transient() {
    let svc = racing(2);
    let err = svc.report_taken(id(1), None, utc(2, 5, 0)).unwrap_err();
    assert!(matches!(err, ServiceError::Transient(_)));
    let snap = svc.store().snapshot(&id(1)).unwrap().unwrap();
    assert!(snap.tail.is_empty());
}
