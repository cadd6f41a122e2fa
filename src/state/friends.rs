// SPDX-License-Identifier: MPL-2.0

use crate::supabase::{Friendship, FriendshipStatus, Profile};

/// All friendships of the signed-in user, partitioned on demand.
#[derive(Debug, Default)]
pub struct FriendList {
    user_id: String,
    friendships: Vec<Friendship>,
}

impl FriendList {
    pub fn new(user_id: &str, friendships: Vec<Friendship>) -> Self {
        Self {
            user_id: user_id.to_string(),
            friendships,
        }
    }

    /// Requests other users sent to me
    pub fn pending_incoming(&self) -> impl Iterator<Item = &Friendship> {
        self.friendships
            .iter()
            .filter(|f| f.status == FriendshipStatus::Pending && f.friend_id == self.user_id)
    }

    pub fn pending_outgoing(&self) -> impl Iterator<Item = &Friendship> {
        self.friendships
            .iter()
            .filter(|f| f.status == FriendshipStatus::Pending && f.user_id == self.user_id)
    }

    pub fn accepted(&self) -> impl Iterator<Item = &Friendship> {
        self.friendships
            .iter()
            .filter(|f| f.status == FriendshipStatus::Accepted)
    }

    /// The other side of a friendship
    pub fn counterpart<'a>(&self, friendship: &'a Friendship) -> Option<&'a Profile> {
        if friendship.user_id == self.user_id {
            friendship.addressee.as_ref()
        } else {
            friendship.requester.as_ref()
        }
    }

    /// Whether a friendship in any state already links me and `other`
    pub fn is_related(&self, other: &str) -> bool {
        self.friendships
            .iter()
            .any(|f| f.user_id == other || f.friend_id == other)
    }

    pub fn is_empty(&self) -> bool {
        self.friendships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.into(),
            username: format!("user_{id}"),
            display_name: None,
            avatar_url: None,
            is_owner: false,
            created_at: String::new(),
        }
    }

    fn friendship(id: &str, from: &str, to: &str, status: FriendshipStatus) -> Friendship {
        Friendship {
            id: id.into(),
            user_id: from.into(),
            friend_id: to.into(),
            status,
            created_at: String::new(),
            requester: Some(profile(from)),
            addressee: Some(profile(to)),
        }
    }

    fn list() -> FriendList {
        FriendList::new(
            "me",
            vec![
                friendship("f1", "alice", "me", FriendshipStatus::Pending),
                friendship("f2", "me", "bob", FriendshipStatus::Pending),
                friendship("f3", "me", "carol", FriendshipStatus::Accepted),
                friendship("f4", "dave", "me", FriendshipStatus::Accepted),
                friendship("f5", "eve", "me", FriendshipStatus::Blocked),
            ],
        )
    }

    fn ids<'a>(iter: impl Iterator<Item = &'a Friendship>) -> Vec<&'a str> {
        iter.map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_partitions() {
        let list = list();
        assert_eq!(ids(list.pending_incoming()), ["f1"]);
        assert_eq!(ids(list.pending_outgoing()), ["f2"]);
        assert_eq!(ids(list.accepted()), ["f3", "f4"]);
    }

    #[test]
    fn test_counterpart_is_the_other_side() {
        let list = list();
        let names: Vec<_> = list
            .accepted()
            .filter_map(|f| list.counterpart(f))
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(names, ["carol", "dave"]);

        let incoming = list.pending_incoming().next().unwrap();
        assert_eq!(list.counterpart(incoming).unwrap().id, "alice");
    }

    #[test]
    fn test_is_related() {
        let list = list();
        assert!(list.is_related("bob"));
        assert!(list.is_related("eve"));
        assert!(!list.is_related("mallory"));
        assert!(FriendList::default().is_empty());
    }
}
