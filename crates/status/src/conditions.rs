//! `ServiceExport.status.conditions`, keyed by `type`.

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use mcs_core::keyed;
use mcs_core::{ConditionStatus, ServiceExportCondition};
use tracing::debug;

pub fn find_condition<'a>(conditions: &'a [ServiceExportCondition], type_: &str) -> Option<&'a ServiceExportCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn is_condition_true(conditions: &[ServiceExportCondition], type_: &str) -> bool {
    find_condition(conditions, type_).map_or(false, |c| c.status == ConditionStatus::True)
}

/// Replace the condition of the same type, or append it.
///
/// `lastTransitionTime` moves only when `status` changes: the proposal's time is
/// used if it carries one, otherwise `now`. Re-submitting the same status keeps the
/// stored time whatever the proposal says. Returns whether the stored entry changed.
pub fn set_condition(
    conditions: &mut Vec<ServiceExportCondition>,
    mut proposed: ServiceExportCondition,
    now: DateTime<Utc>,
) -> bool {
    let previous = find_condition(conditions, &proposed.type_).cloned();
    match &previous {
        Some(prev) if prev.status == proposed.status => {
            proposed.last_transition_time = prev
                .last_transition_time
                .clone()
                .or(proposed.last_transition_time)
                .or(Some(Time(now)));
        }
        _ => {
            if proposed.last_transition_time.is_none() {
                proposed.last_transition_time = Some(Time(now));
            }
            debug!(
                condition = %proposed.type_,
                from = previous.as_ref().map(|p| p.status.as_str()).unwrap_or("<none>"),
                to = proposed.status.as_str(),
                "condition transition"
            );
        }
    }
    if previous.as_ref() == Some(&proposed) {
        return false;
    }
    keyed::upsert(conditions, proposed);
    true
}

/// Remove the condition of `type_`, leaving the others untouched.
pub fn remove_condition(conditions: &mut Vec<ServiceExportCondition>, type_: &str) -> Option<ServiceExportCondition> {
    keyed::remove(conditions, &type_.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mcs_core::condition_type::{EXPORTED, HEADLESS, INITIALIZED};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn seeded() -> Vec<ServiceExportCondition> {
        let mut v = Vec::new();
        set_condition(&mut v, ServiceExportCondition::new(INITIALIZED, ConditionStatus::True), t(0));
        set_condition(&mut v, ServiceExportCondition::new(EXPORTED, ConditionStatus::False), t(0));
        v
    }

    #[test]
    fn status_change_moves_transition_time_and_keeps_others() {
        let mut v = seeded();
        let initialized_before = v[0].clone();
        assert!(set_condition(&mut v, ServiceExportCondition::new(EXPORTED, ConditionStatus::True), t(60)));
        assert_eq!(v.len(), 2);
        assert_eq!(v[0], initialized_before);
        assert_eq!(v[1].type_, EXPORTED);
        assert_eq!(v[1].status, ConditionStatus::True);
        assert_eq!(v[1].last_transition_time, Some(Time(t(60))));
    }

    #[test]
    fn same_status_keeps_transition_time() {
        let mut v = seeded();
        set_condition(&mut v, ServiceExportCondition::new(EXPORTED, ConditionStatus::True), t(60));
        let snapshot = v.clone();
        assert!(!set_condition(&mut v, ServiceExportCondition::new(EXPORTED, ConditionStatus::True), t(120)));
        assert_eq!(v, snapshot);

        // A proposal carrying its own (newer) time does not move it either.
        let mut stale = ServiceExportCondition::new(EXPORTED, ConditionStatus::True).with_reason("Synced");
        stale.last_transition_time = Some(Time(t(500)));
        assert!(set_condition(&mut v, stale, t(600)));
        assert_eq!(v[1].last_transition_time, Some(Time(t(60))));
        assert_eq!(v[1].reason.as_deref(), Some("Synced"));
    }

    #[test]
    fn proposal_time_used_on_transition() {
        let mut v = seeded();
        let mut c = ServiceExportCondition::new(EXPORTED, ConditionStatus::True);
        c.last_transition_time = Some(Time(t(30)));
        set_condition(&mut v, c, t(90));
        assert_eq!(v[1].last_transition_time, Some(Time(t(30))));
    }

    #[test]
    fn new_type_is_appended_and_removable() {
        let mut v = seeded();
        set_condition(&mut v, ServiceExportCondition::new(HEADLESS, ConditionStatus::Unknown), t(5));
        assert_eq!(v.len(), 3);
        assert!(!is_condition_true(&v, HEADLESS));
        assert!(is_condition_true(&v, INITIALIZED));
        assert!(remove_condition(&mut v, HEADLESS).is_some());
        assert!(find_condition(&v, HEADLESS).is_none());
        assert_eq!(v.len(), 2);
    }
}
