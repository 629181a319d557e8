use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::party::UserId;

/// Membership status of a single user inside one party.
///
/// A user with no entry in the party roster has no status at all; that absence is
/// modelled as `None` wherever a status is looked up and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// The creator invited the user; waiting for a decision.
    Invited,
    /// The user accepted the invitation and may join.
    Accepted,
    /// The user turned the invitation down.
    Rejected,
    /// The user is currently playing in the party.
    Joined,
    /// The user left the party on their own.
    Exited,
    /// The creator removed the user from the party.
    Removed,
}

impl PlayerStatus {
    /// Statuses from which a fresh invitation is allowed.
    pub const REINVITABLE: [PlayerStatus; 3] = [Self::Rejected, Self::Exited, Self::Removed];

    /// Lowercase wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Joined => "joined",
            Self::Exited => "exited",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer a user gives to a party invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Take the invitation; the user may join afterwards.
    Accepted,
    /// Turn the invitation down.
    Rejected,
}

impl From<Decision> for PlayerStatus {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Accepted => PlayerStatus::Accepted,
            Decision::Rejected => PlayerStatus::Rejected,
        }
    }
}

/// Error returned when a member status change is not permitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.user_id, .from, .to))]
pub struct InvalidTransition {
    /// User whose status was about to change.
    pub user_id: UserId,
    /// Status the user currently holds, `None` when not a member.
    pub from: Option<PlayerStatus>,
    /// Status that was requested.
    pub to: PlayerStatus,
}

fn describe(user_id: &str, from: &Option<PlayerStatus>, to: &PlayerStatus) -> String {
    match from {
        Some(from) => format!("player {user_id} has current status: {from}. cannot update to {to}"),
        None => format!("player {user_id} not found in the game party. cannot update to {to}"),
    }
}

/// Whether a member may move from `current` to `requested`.
///
/// States are never skipped: an invitation has to be accepted before joining, and
/// only rejected, exited or removed members (or non-members) can be invited again.
pub fn is_transition_allowed(current: Option<PlayerStatus>, requested: PlayerStatus) -> bool {
    use PlayerStatus::*;

    matches!(
        (current, requested),
        (None, Invited)
            | (Some(Invited), Accepted | Rejected)
            | (Some(Accepted), Joined)
            | (Some(Joined), Exited | Removed)
            | (Some(Rejected | Exited | Removed), Invited)
    )
}

/// Validate a single status change for `user_id`.
pub fn check_transition(
    user_id: &str,
    current: Option<PlayerStatus>,
    requested: PlayerStatus,
) -> Result<(), InvalidTransition> {
    if is_transition_allowed(current, requested) {
        Ok(())
    } else {
        Err(InvalidTransition {
            user_id: user_id.to_owned(),
            from: current,
            to: requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlayerStatus::*;

    const ALL: [PlayerStatus; 6] = [Invited, Accepted, Rejected, Joined, Exited, Removed];

    #[test]
    fn first_invitation_is_the_only_way_in() {
        assert!(is_transition_allowed(None, Invited));
        for status in ALL.into_iter().filter(|s| *s != Invited) {
            assert!(!is_transition_allowed(None, status), "None -> {status}");
        }
    }

    #[test]
    fn happy_path_through_a_membership() {
        assert!(is_transition_allowed(Some(Invited), Accepted));
        assert!(is_transition_allowed(Some(Accepted), Joined));
        assert!(is_transition_allowed(Some(Joined), Exited));
        assert!(is_transition_allowed(Some(Exited), Invited));
    }

    #[test]
    fn states_are_never_skipped() {
        assert!(!is_transition_allowed(Some(Invited), Joined));
        assert!(!is_transition_allowed(Some(Accepted), Exited));
        assert!(!is_transition_allowed(Some(Rejected), Joined));
        assert!(!is_transition_allowed(Some(Removed), Accepted));
    }

    #[test]
    fn only_finished_memberships_are_reinvitable() {
        for status in ALL {
            let expected = PlayerStatus::REINVITABLE.contains(&status);
            assert_eq!(
                is_transition_allowed(Some(status), Invited),
                expected,
                "{status} -> invited"
            );
        }
    }

    #[test]
    fn no_status_transitions_to_itself() {
        for status in ALL {
            assert!(!is_transition_allowed(Some(status), status));
        }
    }

    #[test]
    fn invalid_transition_reads_like_a_client_error() {
        let err = check_transition("u2", Some(Accepted), Accepted).unwrap_err();
        assert_eq!(
            err.to_string(),
            "player u2 has current status: accepted. cannot update to accepted"
        );
        let err = check_transition("u9", None, Joined).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
