//! Upcoming-appointment projection for the role dashboards, plus the
//! most-recently-stored overview used by the admin dashboard.
//!
//! Pure and synchronous: callers fetch the full turno set, pass an explicit
//! viewer and `now`, and hand the result to the view payload. Nothing here
//! touches the database or the process clock.
//!
//! All calendar math is anchored on the UTC components of the stored
//! instant. The stored `date` represents a calendar day, and extracting its
//! day through the server's local offset shifts it by one near midnight, so
//! both the ordering instant and the display string must come from UTC
//! fields only.

use chrono::{DateTime, NaiveTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AppointmentRecord, ProjectedAppointment, ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT};

/// Placeholder shown by the overview when a turno has no stored date.
pub const NO_DATE_LABEL: &str = "Fecha no disp.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    Patient,
    Admin,
    Doctor,
}

impl ViewerRole {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            ROLE_PATIENT => Some(ViewerRole::Patient),
            ROLE_ADMIN => Some(ViewerRole::Admin),
            ROLE_DOCTOR => Some(ViewerRole::Doctor),
            _ => None,
        }
    }
}

/// The requesting identity, built explicitly by the handler from the
/// session plus the user's doctor/patient link. Exactly one of the ids is
/// meaningful for the role-scoped dashboards.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub role: ViewerRole,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

impl ViewerContext {
    pub fn doctor(doctor_id: Option<Uuid>) -> Self {
        ViewerContext {
            role: ViewerRole::Doctor,
            doctor_id,
            patient_id: None,
        }
    }

    pub fn patient(patient_id: Option<Uuid>) -> Self {
        ViewerContext {
            role: ViewerRole::Patient,
            doctor_id: None,
            patient_id,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    /// A Medico/Paciente viewer with no linked record of their own. The
    /// projection refuses instead of falling through to an unscoped list.
    #[error("viewer not authorized for role-scoped view")]
    UnauthorizedViewer,
}

/// Turnos still ahead of `now` for this viewer, chronologically ascending,
/// each annotated with its `DD-MM-YYYY` display date.
///
/// Records without a stored date have no orderable instant and are dropped.
/// A malformed `start_time` is not an error: the turno falls back to
/// midnight UTC of its calendar day.
pub fn upcoming(
    records: &[AppointmentRecord],
    viewer: &ViewerContext,
    now: DateTime<Utc>,
) -> Result<Vec<ProjectedAppointment>, ProjectionError> {
    let scoped: Vec<&AppointmentRecord> = match viewer.role {
        ViewerRole::Admin => records.iter().collect(),
        ViewerRole::Doctor => {
            let doctor_id = viewer.doctor_id.ok_or(ProjectionError::UnauthorizedViewer)?;
            records
                .iter()
                .filter(|r| r.doctor_id == Some(doctor_id))
                .collect()
        }
        ViewerRole::Patient => {
            let patient_id = viewer.patient_id.ok_or(ProjectionError::UnauthorizedViewer)?;
            records
                .iter()
                .filter(|r| r.patient_id == Some(patient_id))
                .collect()
        }
    };

    let mut kept: Vec<(DateTime<Utc>, &AppointmentRecord)> = scoped
        .into_iter()
        .filter_map(|r| effective_instant(r).map(|at| (at, r)))
        .filter(|(at, _)| *at >= now)
        .collect();

    // sort_by_key is stable: turnos at the same instant keep input order.
    kept.sort_by_key(|(at, _)| *at);

    Ok(kept.into_iter().map(|(_, r)| annotate(r)).collect())
}

/// The admin dashboard's "últimos turnos" strip: the `limit` most recently
/// stored records (by input position, not by date), newest first. Turnos
/// without a date are kept and labeled [`NO_DATE_LABEL`].
pub fn overview(records: &[AppointmentRecord], limit: usize) -> Vec<ProjectedAppointment> {
    let start = records.len().saturating_sub(limit);
    records[start..].iter().rev().map(annotate).collect()
}

/// The instant a turno is ordered and filtered by: its UTC calendar day
/// combined with the parsed `start_time`, or midnight UTC of that day when
/// the time is absent or unparseable.
fn effective_instant(record: &AppointmentRecord) -> Option<DateTime<Utc>> {
    let day = record.date?.date_naive();
    let time = record
        .start_time
        .as_deref()
        .and_then(parse_start_time)
        .unwrap_or(NaiveTime::MIN);
    Some(day.and_time(time).and_utc())
}

fn parse_start_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn annotate(record: &AppointmentRecord) -> ProjectedAppointment {
    ProjectedAppointment {
        record: record.clone(),
        display_date: display_date_label(record),
    }
}

/// Display date from the record's own stored date, re-extracted from UTC
/// components independently of the ordering instant.
fn display_date_label(record: &AppointmentRecord) -> String {
    match record.date {
        Some(date) => date.date_naive().format("%d-%m-%Y").to_string(),
        None => NO_DATE_LABEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn record(
        n: u128,
        doctor: Option<Uuid>,
        patient: Option<Uuid>,
        date: Option<DateTime<Utc>>,
        start_time: Option<&str>,
    ) -> AppointmentRecord {
        AppointmentRecord {
            appointment_id: Uuid::from_u128(n),
            patient_id: patient,
            doctor_id: doctor,
            date,
            start_time: start_time.map(str::to_string),
            reason: None,
            status: crate::models::APPOINTMENT_STATUS_SCHEDULED,
            created_at: utc(2025, 1, 1, 0, 0, 0),
            patient_name: None,
            doctor_name: None,
            specialty: None,
        }
    }

    fn ids(projected: &[ProjectedAppointment]) -> Vec<Uuid> {
        projected.iter().map(|p| p.record.appointment_id).collect()
    }

    #[test]
    fn keeps_future_and_formats_display_date() {
        let doctor = Uuid::from_u128(0xd0c);
        let records = vec![record(
            1,
            Some(doctor),
            None,
            Some(utc(2025, 3, 10, 0, 0, 0)),
            None,
        )];

        let now = utc(2025, 3, 9, 0, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();

        assert_eq!(ids(&out), vec![Uuid::from_u128(1)]);
        assert_eq!(out[0].display_date, "10-03-2025");
    }

    #[test]
    fn excludes_already_started() {
        let doctor = Uuid::from_u128(0xd0c);
        let records = vec![record(
            1,
            Some(doctor),
            None,
            Some(utc(2025, 3, 10, 0, 0, 0)),
            Some("09:00"),
        )];

        let now = utc(2025, 3, 10, 10, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn never_returns_an_instant_before_now() {
        let doctor = Uuid::from_u128(0xd0c);
        let day = utc(2025, 3, 10, 0, 0, 0);
        let records = vec![
            record(1, Some(doctor), None, Some(day), Some("08:00")),
            record(2, Some(doctor), None, Some(day), Some("12:00")),
            record(3, Some(doctor), None, Some(day), None),
        ];

        let now = utc(2025, 3, 10, 9, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();
        // 08:00 and the midnight fallback are in the past; only 12:00 remains.
        assert_eq!(ids(&out), vec![Uuid::from_u128(2)]);
    }

    #[test]
    fn invalid_start_time_falls_back_to_midnight() {
        let doctor = Uuid::from_u128(0xd0c);
        let day = utc(2025, 3, 10, 0, 0, 0);
        let records = vec![
            record(1, Some(doctor), None, Some(day), Some("08:00")),
            record(2, Some(doctor), None, Some(day), Some("25:99")),
        ];

        let now = utc(2025, 3, 9, 0, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();
        // The malformed turno sorts at midnight, ahead of 08:00.
        assert_eq!(ids(&out), vec![Uuid::from_u128(2), Uuid::from_u128(1)]);
    }

    #[test]
    fn accepts_start_time_with_seconds() {
        let doctor = Uuid::from_u128(0xd0c);
        let records = vec![record(
            1,
            Some(doctor),
            None,
            Some(utc(2025, 3, 10, 0, 0, 0)),
            Some("09:30:00"),
        )];

        let now = utc(2025, 3, 10, 9, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();
        assert_eq!(ids(&out), vec![Uuid::from_u128(1)]);
    }

    #[test]
    fn missing_date_is_dropped_from_upcoming() {
        let doctor = Uuid::from_u128(0xd0c);
        let records = vec![
            record(1, Some(doctor), None, None, Some("09:00")),
            record(2, Some(doctor), None, Some(utc(2025, 3, 12, 0, 0, 0)), None),
        ];

        let now = utc(2025, 3, 9, 0, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();
        assert_eq!(ids(&out), vec![Uuid::from_u128(2)]);
    }

    #[test]
    fn sorted_ascending_with_stable_ties() {
        let doctor = Uuid::from_u128(0xd0c);
        let records = vec![
            record(1, Some(doctor), None, Some(utc(2025, 3, 12, 0, 0, 0)), Some("10:00")),
            record(2, Some(doctor), None, Some(utc(2025, 3, 11, 0, 0, 0)), Some("10:00")),
            record(3, Some(doctor), None, Some(utc(2025, 3, 11, 0, 0, 0)), Some("10:00")),
        ];

        let now = utc(2025, 3, 9, 0, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();
        assert_eq!(
            ids(&out),
            vec![Uuid::from_u128(2), Uuid::from_u128(3), Uuid::from_u128(1)]
        );
    }

    #[test]
    fn projecting_twice_is_idempotent() {
        let doctor = Uuid::from_u128(0xd0c);
        let records = vec![
            record(1, Some(doctor), None, Some(utc(2025, 3, 12, 0, 0, 0)), Some("10:00")),
            record(2, Some(doctor), None, Some(utc(2025, 3, 11, 0, 0, 0)), None),
        ];
        let now = utc(2025, 3, 9, 0, 0, 0);
        let viewer = ViewerContext::doctor(Some(doctor));

        let once = upcoming(&records, &viewer, now).unwrap();
        let filtered: Vec<AppointmentRecord> =
            once.iter().map(|p| p.record.clone()).collect();
        let twice = upcoming(&filtered, &viewer, now).unwrap();

        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn doctor_scope_keeps_only_own_turnos() {
        let me = Uuid::from_u128(0xd0c);
        let other = Uuid::from_u128(0xbad);
        let day = Some(utc(2025, 3, 12, 0, 0, 0));
        let records = vec![
            record(1, Some(me), None, day, None),
            record(2, Some(other), None, day, None),
            record(3, None, None, day, None),
        ];

        let now = utc(2025, 3, 9, 0, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(me)), now).unwrap();
        assert_eq!(ids(&out), vec![Uuid::from_u128(1)]);
    }

    #[test]
    fn patient_scope_keeps_only_own_turnos() {
        let me = Uuid::from_u128(0xabc);
        let day = Some(utc(2025, 3, 12, 0, 0, 0));
        let records = vec![
            record(1, None, Some(me), day, None),
            record(2, None, Some(Uuid::from_u128(0xdef)), day, None),
        ];

        let now = utc(2025, 3, 9, 0, 0, 0);
        let out = upcoming(&records, &ViewerContext::patient(Some(me)), now).unwrap();
        assert_eq!(ids(&out), vec![Uuid::from_u128(1)]);
    }

    #[test]
    fn admin_sees_all_upcoming() {
        let day = Some(utc(2025, 3, 12, 0, 0, 0));
        let records = vec![
            record(1, Some(Uuid::from_u128(1)), None, day, None),
            record(2, None, Some(Uuid::from_u128(2)), day, None),
        ];

        let admin = ViewerContext {
            role: ViewerRole::Admin,
            doctor_id: None,
            patient_id: None,
        };
        let now = utc(2025, 3, 9, 0, 0, 0);
        let out = upcoming(&records, &admin, now).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn viewer_without_linked_id_is_refused() {
        let records = vec![record(
            1,
            Some(Uuid::from_u128(1)),
            None,
            Some(utc(2025, 3, 12, 0, 0, 0)),
            None,
        )];
        let now = utc(2025, 3, 9, 0, 0, 0);

        assert_eq!(
            upcoming(&records, &ViewerContext::doctor(None), now).unwrap_err(),
            ProjectionError::UnauthorizedViewer
        );
        assert_eq!(
            upcoming(&records, &ViewerContext::patient(None), now).unwrap_err(),
            ProjectionError::UnauthorizedViewer
        );
    }

    #[test]
    fn overview_takes_last_n_reversed() {
        let records: Vec<AppointmentRecord> = (1..=15)
            .map(|n| record(n, None, None, Some(utc(2025, 3, n as u32, 0, 0, 0)), None))
            .collect();

        let out = overview(&records, 10);
        let expected: Vec<Uuid> = (6..=15).rev().map(Uuid::from_u128).collect();
        assert_eq!(ids(&out), expected);
    }

    #[test]
    fn overview_keeps_dateless_records_with_placeholder() {
        let records = vec![
            record(1, None, None, Some(utc(2025, 3, 10, 0, 0, 0)), None),
            record(2, None, None, None, None),
        ];

        let out = overview(&records, 10);
        assert_eq!(ids(&out), vec![Uuid::from_u128(2), Uuid::from_u128(1)]);
        assert_eq!(out[0].display_date, NO_DATE_LABEL);
        assert_eq!(out[1].display_date, "10-03-2025");
    }

    #[test]
    fn overview_shorter_than_limit_returns_everything() {
        let records = vec![
            record(1, None, None, Some(utc(2025, 3, 10, 0, 0, 0)), None),
            record(2, None, None, Some(utc(2025, 3, 11, 0, 0, 0)), None),
        ];

        let out = overview(&records, 10);
        assert_eq!(ids(&out), vec![Uuid::from_u128(2), Uuid::from_u128(1)]);
    }

    #[test]
    fn display_date_ignores_start_time_and_instant_offsets() {
        // Stored late in the UTC day; the label still reads the UTC calendar
        // components, so no off-by-one-day drift is possible.
        let doctor = Uuid::from_u128(0xd0c);
        let records = vec![record(
            1,
            Some(doctor),
            None,
            Some(utc(2025, 3, 10, 23, 30, 0)),
            Some("22:00"),
        )];

        let now = utc(2025, 3, 1, 0, 0, 0);
        let out = upcoming(&records, &ViewerContext::doctor(Some(doctor)), now).unwrap();
        assert_eq!(out[0].display_date, "10-03-2025");
    }

    #[test]
    fn role_codes_round_trip() {
        assert_eq!(ViewerRole::from_code(0), Some(ViewerRole::Patient));
        assert_eq!(ViewerRole::from_code(1), Some(ViewerRole::Admin));
        assert_eq!(ViewerRole::from_code(2), Some(ViewerRole::Doctor));
        assert_eq!(ViewerRole::from_code(7), None);
    }
}
