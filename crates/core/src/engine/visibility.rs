//! Audience classification (spec §3, §9): derived from `to`/`cc`/`audience`
//! at read time, never stored. Reclassifying an unchanged row always yields
//! the same class (spec §8 invariant).

use tootik_db::entities::actor;

/// The special `as:Public` addressee.
pub const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

/// An object's derived visibility class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// `to`/`cc` contains [`PUBLIC`].
    Public,
    /// `to`/`cc` contains the author's followers collection, but not
    /// [`PUBLIC`].
    FollowersOnly,
    /// `to`/`cc`/`audience` contains a `Group` actor (spec §9: "the
    /// community of a reply is the first Group actor in the parent
    /// object's `cc`").
    Group(String),
    /// None of the above: only explicit recipients.
    Direct,
}

/// Classify from raw address lists, without resolving actor types. Returns
/// `Public`/`FollowersOnly`/`Direct`; callers that need `Group` detection
/// call [`first_group_actor`] against resolved actor rows.
#[must_use]
pub fn classify_basic(to: &[String], cc: &[String], followers_url: &str) -> Visibility {
    let all = to.iter().chain(cc.iter());
    if to.iter().chain(cc.iter()).any(|a| a == PUBLIC) {
        return Visibility::Public;
    }
    if all.clone().any(|a| a == followers_url) {
        return Visibility::FollowersOnly;
    }
    Visibility::Direct
}

/// The first address in `cc` that resolves to a `Group` actor, if any
/// (spec §9 "no separate community table" — group/community membership is
/// entirely derived from audience).
#[must_use]
pub fn first_group_actor<'a>(cc: &'a [String], resolved: &[actor::Model]) -> Option<&'a String> {
    cc.iter().find(|addr| {
        resolved
            .iter()
            .any(|a| &a.id == *addr && a.actor_type == "Group")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_wins_over_followers() {
        let to = vec![PUBLIC.to_string(), "https://x/followers/alice".to_string()];
        let v = classify_basic(&to, &[], "https://x/followers/alice");
        assert_eq!(v, Visibility::Public);
    }

    #[test]
    fn followers_only_when_only_followers_collection_present() {
        let to = vec!["https://x/followers/alice".to_string()];
        let v = classify_basic(&to, &[], "https://x/followers/alice");
        assert_eq!(v, Visibility::FollowersOnly);
    }

    #[test]
    fn direct_when_neither_present() {
        let to = vec!["https://x/user/bob".to_string()];
        let v = classify_basic(&to, &[], "https://x/followers/alice");
        assert_eq!(v, Visibility::Direct);
    }
}
