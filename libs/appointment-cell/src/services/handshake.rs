use shared_config::HandshakeMode;

use crate::models::{AppointmentError, HandshakeParty, HandshakeStatus, HandshakeVotes};

/// Result of casting a vote against the currently stored votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    /// The same vote is already recorded.
    Unchanged,
    Changed(HandshakeVotes),
}

pub fn cast_vote(
    mode: HandshakeMode,
    current: HandshakeVotes,
    party: HandshakeParty,
    agrees: bool,
) -> Result<VoteChange, AppointmentError> {
    if mode == HandshakeMode::Mirror && party == HandshakeParty::Practitioner {
        return Err(AppointmentError::InvalidState(
            "Practitioner handshake follows the client's response".to_string(),
        ));
    }

    let recorded = match party {
        HandshakeParty::User => current.user,
        HandshakeParty::Practitioner => current.practitioner,
    };

    match recorded {
        Some(previous) if previous == agrees => return Ok(VoteChange::Unchanged),
        Some(_) => return Err(AppointmentError::HandshakeAlreadySubmitted(party)),
        None => {}
    }

    let next = match (mode, party) {
        // A practitioner vote already on record is kept.
        (HandshakeMode::Mirror, HandshakeParty::User) => HandshakeVotes {
            user: Some(agrees),
            practitioner: current.practitioner.or(Some(agrees)),
        },
        (HandshakeMode::TwoParty, HandshakeParty::User) => HandshakeVotes {
            user: Some(agrees),
            ..current
        },
        (_, HandshakeParty::Practitioner) => HandshakeVotes {
            practitioner: Some(agrees),
            ..current
        },
    };

    Ok(VoteChange::Changed(next))
}

pub fn outcome_message(status: HandshakeStatus, party: HandshakeParty) -> &'static str {
    match (status, party) {
        (HandshakeStatus::Completed, _) => {
            "Handshake complete! Regular sessions with this practitioner are now unlocked."
        }
        (HandshakeStatus::Declined, HandshakeParty::User) => {
            "No match this time. Explore other practitioners to find a better fit."
        }
        (HandshakeStatus::Declined, HandshakeParty::Practitioner) => {
            "Handshake declined. The client will be guided towards other practitioners."
        }
        (HandshakeStatus::PendingPractitioner, _) => {
            "Thanks! Waiting for the practitioner to confirm the handshake."
        }
        (HandshakeStatus::PendingUser, _) => "Thanks! Waiting for the client to respond.",
    }
}
