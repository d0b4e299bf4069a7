//! Authorization gate.
//!
//! Runs strictly before any field mutation: a denial means no update, no
//! lifecycle transition, and no audit entry.

use crate::entity::{Authorizable, ROLE_FOUNDER};
use crate::error::{GreenroomError, Result};

/// Mutating action checked by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Create,
    Edit,
    Delete,
    Join,
    Leave,
}

/// Require a signed-in actor; the identity provider resolving it is an
/// external collaborator.
pub fn require_actor(actor: Option<&str>) -> Result<&str> {
    actor.ok_or_else(|| GreenroomError::Authorization("Not logged in".to_string()))
}

/// Check whether `actor` may perform `action` on `object`. The gate sees
/// only the capability projection: owner identity, membership roles.
pub fn authorize<T: Authorizable>(
    actor: Option<&str>,
    object: &T,
    action: AuthAction,
) -> Result<()> {
    let actor = require_actor(actor)?;

    match action {
        AuthAction::Create => Ok(()),
        AuthAction::Edit | AuthAction::Delete => {
            if object.owner_id() == actor {
                return Ok(());
            }

            // Types with membership roles let founders edit and delete.
            if object.role_of(actor) == Some(ROLE_FOUNDER) {
                return Ok(());
            }

            Err(GreenroomError::Authorization(format!(
                "Can't {} {} objects from other people",
                if action == AuthAction::Edit {
                    "edit"
                } else {
                    "delete"
                },
                T::TYPE_NAME
            )))
        }
        AuthAction::Join => {
            if object.is_member(actor) {
                Err(GreenroomError::Conflict(
                    "Already a member of this group".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        // Leaving is always allowed; leaving twice is a no-op downstream.
        AuthAction::Leave => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Group, Joinable, Settings, SoundTrack};

    fn group_with_founder(owner: &str, founder: &str) -> Group {
        let mut group = Group {
            id: "g1".to_string(),
            ..Group::default()
        };
        group.creator.created_by = owner.to_string();
        group.add_member(founder, ROLE_FOUNDER, "2024-01-01T00:00:00Z");
        group
    }

    #[test]
    fn unauthenticated_is_denied_everything() {
        let group = group_with_founder("u1", "u1");

        for action in [
            AuthAction::Create,
            AuthAction::Edit,
            AuthAction::Delete,
            AuthAction::Join,
            AuthAction::Leave,
        ] {
            assert!(matches!(
                authorize(None, &group, action),
                Err(GreenroomError::Authorization(_))
            ));
        }
    }

    #[test]
    fn only_creator_edits_soundtracks() {
        let mut track = SoundTrack::default();
        track.creator.created_by = "u1".to_string();

        assert!(authorize(Some("u1"), &track, AuthAction::Edit).is_ok());
        assert!(matches!(
            authorize(Some("u2"), &track, AuthAction::Edit),
            Err(GreenroomError::Authorization(_))
        ));
    }

    #[test]
    fn founder_role_permits_group_edit() {
        let group = group_with_founder("u1", "u2");

        assert!(authorize(Some("u2"), &group, AuthAction::Edit).is_ok());
        assert!(authorize(Some("u2"), &group, AuthAction::Delete).is_ok());
        assert!(matches!(
            authorize(Some("u3"), &group, AuthAction::Edit),
            Err(GreenroomError::Authorization(_))
        ));
    }

    #[test]
    fn join_conflicts_for_existing_member() {
        let group = group_with_founder("u1", "u1");

        assert!(matches!(
            authorize(Some("u1"), &group, AuthAction::Join),
            Err(GreenroomError::Conflict(_))
        ));
        assert!(authorize(Some("u2"), &group, AuthAction::Join).is_ok());
        assert!(authorize(Some("u2"), &group, AuthAction::Leave).is_ok());
    }

    #[test]
    fn settings_are_owned_by_their_user() {
        let settings = Settings::new("u1");

        assert!(authorize(Some("u1"), &settings, AuthAction::Edit).is_ok());
        assert!(matches!(
            authorize(Some("u2"), &settings, AuthAction::Edit),
            Err(GreenroomError::Authorization(_))
        ));
    }
}
