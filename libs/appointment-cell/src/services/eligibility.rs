use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, BookingBlock, HandshakeStatus};
use crate::services::pricing::BookingKind;

/// Decides whether the user may book with this practitioner again, given every
/// appointment the pair has ever had.
pub fn assess_pair_history(history: &[Appointment]) -> Result<BookingKind, BookingBlock> {
    let live: Vec<&Appointment> = history
        .iter()
        .filter(|a| matches!(a.status, AppointmentStatus::Confirmed | AppointmentStatus::Completed))
        .collect();

    if live.is_empty() {
        return Ok(BookingKind::Introductory);
    }

    let latest_completed_intro = live
        .iter()
        .filter(|a| a.is_introductory_session && a.status == AppointmentStatus::Completed)
        .max_by_key(|a| a.sort_key());

    let Some(intro) = latest_completed_intro else {
        if live.iter().any(|a| a.is_introductory_session) {
            return Err(BookingBlock::IntroductionScheduled);
        }
        // Regular sessions without any introduction on record, keep them bookable.
        return Ok(BookingKind::Regular);
    };

    debug!("Latest introduction {} has handshake {}", intro.id, intro.handshake_status);

    if intro.handshake_completed {
        return Ok(BookingKind::Regular);
    }

    match (intro.user_handshake, intro.handshake_status) {
        (None, HandshakeStatus::Declined) => Err(BookingBlock::HandshakeDeclined),
        (None, _) => Err(BookingBlock::HandshakeRequired),
        (Some(_), HandshakeStatus::PendingPractitioner) => Err(BookingBlock::AwaitingPractitioner),
        (Some(_), _) => Err(BookingBlock::HandshakeDeclined),
    }
}

/// A user may only have one live introduction at a time.
pub fn ensure_single_active_introduction(
    user_introductions: &[Appointment],
    practitioner_id: Uuid,
) -> Result<(), BookingBlock> {
    match user_introductions
        .iter()
        .find(|a| a.practitioner_id != practitioner_id && a.is_active_introduction())
    {
        Some(active) => {
            debug!("User {} has an active introduction {} with {}",
                   active.user_id, active.id, active.practitioner_id);
            Err(BookingBlock::ActiveIntroductionElsewhere)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HandshakeVotes, SessionType};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn appointment(intro: bool, status: AppointmentStatus, votes: HandshakeVotes, day: u32) -> Appointment {
        let now = Utc::now();
        let mut appointment = Appointment {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            practitioner_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2030, 1, day).unwrap(),
            time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            session_type: SessionType::Video,
            booking_id: format!("BK{}", day),
            status,
            duration: "20 minutes".to_string(),
            session_price: 99.0,
            is_introductory_session: intro,
            handshake_status: HandshakeStatus::PendingUser,
            user_handshake: None,
            practitioner_handshake: None,
            handshake_completed: false,
            notes: None,
            session_link: None,
            session_started: None,
            session_ended: None,
            created_at: now,
            updated_at: now,
        };
        appointment.apply_votes(votes);
        appointment
    }

    fn votes(user: Option<bool>, practitioner: Option<bool>) -> HandshakeVotes {
        HandshakeVotes { user, practitioner }
    }

    #[test]
    fn test_first_booking_is_introductory() {
        assert_eq!(assess_pair_history(&[]), Ok(BookingKind::Introductory));

        // Cancelled and missed sessions do not count as history.
        let history = vec![
            appointment(true, AppointmentStatus::Cancelled, votes(None, None), 1),
            appointment(true, AppointmentStatus::NoShow, votes(None, None), 2),
        ];
        assert_eq!(assess_pair_history(&history), Ok(BookingKind::Introductory));
    }

    #[test]
    fn test_scheduled_introduction_blocks() {
        let history = vec![appointment(true, AppointmentStatus::Confirmed, votes(None, None), 1)];
        assert_eq!(assess_pair_history(&history), Err(BookingBlock::IntroductionScheduled));
    }

    #[test]
    fn test_handshake_outcomes() {
        let completed = |v| vec![appointment(true, AppointmentStatus::Completed, v, 1)];

        assert_eq!(assess_pair_history(&completed(votes(None, None))), Err(BookingBlock::HandshakeRequired));
        assert_eq!(assess_pair_history(&completed(votes(None, Some(true)))), Err(BookingBlock::HandshakeRequired));
        assert_eq!(assess_pair_history(&completed(votes(None, Some(false)))), Err(BookingBlock::HandshakeDeclined));
        assert_eq!(assess_pair_history(&completed(votes(Some(true), None))), Err(BookingBlock::AwaitingPractitioner));
        assert_eq!(assess_pair_history(&completed(votes(Some(false), Some(false)))), Err(BookingBlock::HandshakeDeclined));
        assert_eq!(assess_pair_history(&completed(votes(Some(true), Some(false)))), Err(BookingBlock::HandshakeDeclined));
        assert_eq!(assess_pair_history(&completed(votes(Some(true), Some(true)))), Ok(BookingKind::Regular));
    }

    #[test]
    fn test_follow_ups_allowed_after_successful_handshake() {
        let history = vec![
            appointment(true, AppointmentStatus::Completed, votes(Some(true), Some(true)), 1),
            appointment(false, AppointmentStatus::Confirmed, votes(None, None), 8),
        ];
        assert_eq!(assess_pair_history(&history), Ok(BookingKind::Regular));
    }

    #[test]
    fn test_most_recent_introduction_wins() {
        let history = vec![
            appointment(true, AppointmentStatus::Completed, votes(Some(true), Some(true)), 1),
            appointment(true, AppointmentStatus::Completed, votes(None, None), 9),
        ];
        assert_eq!(assess_pair_history(&history), Err(BookingBlock::HandshakeRequired));
    }

    #[test]
    fn test_single_active_introduction() {
        let other = Uuid::new_v4();
        let target = Uuid::new_v4();

        let mut pending = appointment(true, AppointmentStatus::Completed, votes(Some(true), None), 1);
        pending.practitioner_id = other;
        assert_eq!(
            ensure_single_active_introduction(&[pending.clone()], target),
            Err(BookingBlock::ActiveIntroductionElsewhere)
        );
        // The same practitioner is judged by the pair history instead.
        assert_eq!(ensure_single_active_introduction(&[pending], other), Ok(()));

        let mut declined = appointment(true, AppointmentStatus::Completed, votes(Some(false), Some(false)), 1);
        declined.practitioner_id = other;
        let mut cancelled = appointment(true, AppointmentStatus::Cancelled, votes(None, None), 2);
        cancelled.practitioner_id = other;
        assert_eq!(ensure_single_active_introduction(&[declined, cancelled], target), Ok(()));
    }
}
