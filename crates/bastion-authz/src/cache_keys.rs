//! Cache keys for authorization decisions. Every key starts with
//! [`PERMISSIONS_PREFIX`], so one prefix flush drops them all.
//!
//! Name segments are escaped (`%` as `%25`, `-` as `%2D`) so a `-` inside
//! a name cannot shift a segment boundary. Names without either character
//! appear verbatim.

use std::borrow::Cow;

use uuid::Uuid;

pub const PERMISSIONS_PREFIX: &str = "permissions.";

fn segment(name: &str) -> Cow<'_, str> {
    if name.contains(['-', '%']) {
        Cow::Owned(name.replace('%', "%25").replace('-', "%2D"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Whether a role holds a permission record.
pub fn role_allowed(role_id: Uuid, system_name: &str) -> String {
    format!("{PERMISSIONS_PREFIX}allowed-{role_id}-{}", segment(system_name))
}

/// Whether a role has a revocation row for an action.
pub fn role_action(role_id: Uuid, system_name: &str, action_name: &str) -> String {
    format!(
        "{PERMISSIONS_PREFIX}allowedaction-{role_id}-{}-{}",
        segment(system_name),
        segment(action_name)
    )
}

/// A user's explicit override for an action, if any.
pub fn user_action(user_id: Uuid, system_name: &str, action_name: &str) -> String {
    format!(
        "{PERMISSIONS_PREFIX}useraction-{user_id}-{}-{}",
        segment(system_name),
        segment(action_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_templates() {
        let id = Uuid::nil();
        assert_eq!(
            role_allowed(id, "Articles"),
            "permissions.allowed-00000000-0000-0000-0000-000000000000-Articles"
        );
        assert_eq!(
            role_action(id, "Articles", "Publish"),
            "permissions.allowedaction-00000000-0000-0000-0000-000000000000-Articles-Publish"
        );
        assert_eq!(
            user_action(id, "Articles", "Publish"),
            "permissions.useraction-00000000-0000-0000-0000-000000000000-Articles-Publish"
        );
    }

    #[test]
    fn dashes_in_names_do_not_collide() {
        let id = Uuid::new_v4();
        assert_ne!(role_action(id, "A-B", "C"), role_action(id, "A", "B-C"));
        assert_ne!(user_action(id, "A-B", "C"), user_action(id, "A", "B-C"));
        assert_ne!(role_action(id, "A%2DB", "C"), role_action(id, "A-B", "C"));
        assert!(role_allowed(id, "Self-Service").ends_with("-Self%2DService"));
    }

    #[test]
    fn all_keys_share_the_flush_prefix() {
        let id = Uuid::new_v4();
        for key in [
            role_allowed(id, "A"),
            role_action(id, "A", "B"),
            user_action(id, "A", "B"),
        ] {
            assert!(key.starts_with(PERMISSIONS_PREFIX));
        }
    }
}
