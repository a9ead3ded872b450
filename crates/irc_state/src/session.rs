//! The in-memory session state — users, channels, memberships, capability
//! bookkeeping, and server parameters. Every operation here assumes it runs
//! on the engine's single worker thread; `irc_engine`'s `StateGuard` is what
//! actually enforces that at runtime, this module just owns the data.
//!
//! Map keys are always casemapping-normalized; the stored value keeps the
//! original display casing, per the invariant that normalization is
//! consulted per lookup and never cached on the entity.

use std::collections::{BTreeSet, HashMap};

use crate::capability::CapabilitySet;
use crate::error::StateError;
use crate::isupport::Parameters;

#[derive(Debug, Clone, Default)]
pub struct Membership {
    pub modes: BTreeSet<char>,
}

#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    /// Keyed by casemap-normalized nick.
    members: HashMap<String, Membership>,
    pub topic: Option<String>,
    pub modes: BTreeSet<char>,
}

impl Channel {
    fn new(name: &str) -> Self {
        Channel {
            name: name.to_owned(),
            members: HashMap::new(),
            topic: None,
            modes: BTreeSet::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn membership(&self, normalized_nick: &str) -> Option<&Membership> {
        self.members.get(normalized_nick)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Membership)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone)]
pub struct User {
    display: String,
    pub last_touched_millis: i64,
    /// Normalized channel keys, insertion-ordered; `focus_channel`
    /// re-inserts the focused key at the tail.
    channels: Vec<String>,
}

impl User {
    fn new(nick: &str, now_millis: i64) -> Self {
        User {
            display: nick.to_owned(),
            last_touched_millis: now_millis,
            channels: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }
}

/// The full per-connection session: users, channels, ISUPPORT parameters,
/// and capability negotiation state. Created fresh on every successful
/// connect and discarded on disconnect.
#[derive(Debug, Clone)]
pub struct Session {
    parameters: Parameters,
    capabilities: CapabilitySet,
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    me: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            parameters: Parameters::default(),
            capabilities: CapabilitySet::new(),
            users: HashMap::new(),
            channels: HashMap::new(),
            me: None,
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn capabilities_mut(&mut self) -> &mut CapabilitySet {
        &mut self.capabilities
    }

    pub fn me(&self) -> Option<&str> {
        self.me.as_deref()
    }

    fn key(&self, name: &str) -> String {
        self.parameters.casemapping.normalize(name)
    }

    pub fn find_user(&self, nick: &str) -> Option<&User> {
        self.users.get(&self.key(nick))
    }

    pub fn find_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.key(name))
    }

    /// `set_me(nick)` — set the local nickname, creating the User entry if
    /// it doesn't already exist.
    pub fn set_me(&mut self, nick: &str, now_millis: i64) {
        let key = self.key(nick);
        self.users
            .entry(key)
            .or_insert_with(|| User::new(nick, now_millis));
        self.me = Some(nick.to_owned());
    }

    pub fn touch(&mut self, nick: &str, now_millis: i64) {
        let key = self.key(nick);
        match self.users.get_mut(&key) {
            Some(user) => {
                user.display = nick.to_owned();
                user.last_touched_millis = now_millis;
            }
            None => {
                self.users.insert(key, User::new(nick, now_millis));
            }
        }
    }

    pub fn add_channel_member(
        &mut self,
        channel: &str,
        nick: &str,
        modes: impl IntoIterator<Item = char>,
        now_millis: i64,
    ) {
        let ckey = self.key(channel);
        let ukey = self.key(nick);

        self.channels.entry(ckey.clone()).or_insert_with(|| Channel::new(channel));
        self.users
            .entry(ukey.clone())
            .or_insert_with(|| User::new(nick, now_millis));

        let chan = self.channels.get_mut(&ckey).unwrap();
        let membership = chan.members.entry(ukey.clone()).or_default();
        membership.modes.extend(modes);

        let user = self.users.get_mut(&ukey).unwrap();
        user.display = nick.to_owned();
        if !user.channels.contains(&ckey) {
            user.channels.push(ckey);
        }
    }

    pub fn add_channel_member_modes(
        &mut self,
        channel: &str,
        nick: &str,
        modes: impl IntoIterator<Item = char>,
    ) {
        let ckey = self.key(channel);
        let ukey = self.key(nick);
        if let Some(membership) = self.channels.get_mut(&ckey).and_then(|c| c.members.get_mut(&ukey)) {
            membership.modes.extend(modes);
        }
    }

    pub fn delete_channel_member_modes(
        &mut self,
        channel: &str,
        nick: &str,
        modes: impl IntoIterator<Item = char>,
    ) {
        let ckey = self.key(channel);
        let ukey = self.key(nick);
        if let Some(membership) = self.channels.get_mut(&ckey).and_then(|c| c.members.get_mut(&ukey)) {
            for m in modes {
                membership.modes.remove(&m);
            }
        }
    }

    /// Remove the membership; drops the channel entirely if it becomes
    /// empty.
    pub fn delete_channel_member(&mut self, channel: &str, nick: &str) {
        let ckey = self.key(channel);
        let ukey = self.key(nick);

        let now_empty = match self.channels.get_mut(&ckey) {
            Some(chan) => {
                chan.members.remove(&ukey);
                chan.members.is_empty()
            }
            None => false,
        };
        if let Some(user) = self.users.get_mut(&ukey) {
            user.channels.retain(|c| c != &ckey);
        }
        if now_empty {
            self.channels.remove(&ckey);
        }
    }

    /// Move the user's entry to the `new` key, preserving memberships.
    /// No-op (besides a display-casing update) when the normalized keys are
    /// equal.
    pub fn change_nickname(&mut self, old: &str, new: &str) {
        let old_key = self.key(old);
        let new_key = self.key(new);
        let was_me = self.me.as_deref().map(|m| self.key(m)) == Some(old_key.clone());

        if old_key == new_key {
            if let Some(user) = self.users.get_mut(&old_key) {
                user.display = new.to_owned();
            }
        } else if let Some(mut user) = self.users.remove(&old_key) {
            user.display = new.to_owned();
            for ckey in user.channels.clone() {
                if let Some(chan) = self.channels.get_mut(&ckey) {
                    if let Some(membership) = chan.members.remove(&old_key) {
                        chan.members.insert(new_key.clone(), membership);
                    }
                }
            }
            self.users.insert(new_key.clone(), user);
        }

        if was_me {
            self.me = Some(new.to_owned());
        }
    }

    /// Drop the user from every channel (deleting empty channels) and from
    /// the user map. A no-op for the local user — reconnecting rebuilds
    /// state from scratch instead.
    pub fn quit(&mut self, nick: &str) {
        let key = self.key(nick);
        if self.me.as_deref().map(|m| self.key(m)) == Some(key.clone()) {
            return;
        }
        if let Some(user) = self.users.remove(&key) {
            for ckey in user.channels {
                let now_empty = match self.channels.get_mut(&ckey) {
                    Some(chan) => {
                        chan.members.remove(&key);
                        chan.members.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.channels.remove(&ckey);
                }
            }
        }
    }

    /// Remove users that are not `me`, are in zero channels, and were last
    /// touched before `cutoff_millis`.
    pub fn gc(&mut self, cutoff_millis: i64) {
        let me_key = self.me.as_deref().map(|m| self.key(m));
        let doomed: Vec<String> = self
            .users
            .iter()
            .filter(|(k, u)| {
                Some((*k).clone()) != me_key
                    && u.channels.is_empty()
                    && u.last_touched_millis < cutoff_millis
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            self.users.remove(&key);
        }
    }

    /// Move `name` to the tail of the local user's ordered channel set.
    /// Fails if the local user isn't a member (including when there's no
    /// local user yet).
    pub fn focus_channel(&mut self, name: &str) -> Result<(), StateError> {
        let me_key = self
            .me
            .as_deref()
            .map(|m| self.key(m))
            .ok_or_else(|| StateError::NotAMember(name.to_owned()))?;
        let ckey = self.key(name);
        let user = self
            .users
            .get_mut(&me_key)
            .ok_or_else(|| StateError::NotAMember(name.to_owned()))?;
        if !user.channels.contains(&ckey) {
            return Err(StateError::NotAMember(name.to_owned()));
        }
        user.channels.retain(|c| c != &ckey);
        user.channels.push(ckey);
        Ok(())
    }

    /// The last channel the local user focused, i.e. the implicit target
    /// for commands that omit one.
    pub fn focused_channel(&self) -> Option<&str> {
        let me_key = self.me.as_deref().map(|m| self.key(m))?;
        let user = self.users.get(&me_key)?;
        let last_key = user.channels.last()?;
        self.channels.get(last_key).map(Channel::display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_bidirectional_and_empty_channel_is_dropped() {
        let mut s = Session::new();
        s.add_channel_member("#a", "alice", [], 0);
        assert!(s.find_channel("#a").is_some());
        assert!(s.find_user("alice").unwrap().channels().contains(&"#a".to_owned()));

        s.delete_channel_member("#a", "alice");
        assert!(s.find_channel("#a").is_none());
        assert!(s.find_user("alice").unwrap().channels().is_empty());
    }

    #[test]
    fn gc_removes_idle_non_member_non_me_users() {
        let mut s = Session::new();
        s.set_me("me", 0);
        s.touch("bystander", 0);
        s.add_channel_member("#a", "member", [], 0);

        s.gc(301_000);

        assert!(s.find_user("me").is_some());
        assert!(s.find_user("member").is_some());
        assert!(s.find_user("bystander").is_none());
    }

    #[test]
    fn change_nickname_rekeys_memberships_and_updates_me() {
        let mut s = Session::new();
        s.set_me("old", 0);
        s.add_channel_member("#a", "old", ['o'], 0);

        s.change_nickname("old", "new");

        assert_eq!(s.me(), Some("new"));
        assert!(s.find_user("old").is_none());
        assert_eq!(s.find_user("new").unwrap().display_name(), "new");
        let membership = s.find_channel("#a").unwrap().membership(&s.key("new")).unwrap();
        assert!(membership.modes.contains(&'o'));
    }

    #[test]
    fn focus_channel_requires_membership() {
        let mut s = Session::new();
        s.set_me("me", 0);
        assert!(s.focus_channel("#a").is_err());
        s.add_channel_member("#a", "me", [], 0);
        assert!(s.focus_channel("#a").is_ok());
        assert_eq!(s.focused_channel(), Some("#a"));
    }

    #[test]
    fn focus_channel_is_idempotent() {
        let mut s = Session::new();
        s.set_me("me", 0);
        s.add_channel_member("#a", "me", [], 0);
        s.add_channel_member("#b", "me", [], 0);
        s.focus_channel("#a").unwrap();
        let after_one = s.find_user("me").unwrap().channels().to_vec();
        s.focus_channel("#a").unwrap();
        let after_two = s.find_user("me").unwrap().channels().to_vec();
        assert_eq!(after_one, after_two);
    }

    #[test]
    fn quit_skips_the_local_user() {
        let mut s = Session::new();
        s.set_me("me", 0);
        s.quit("me");
        assert!(s.find_user("me").is_some());
    }

    #[test]
    fn casemapping_normalizes_lookup_but_preserves_display_casing() {
        let mut s = Session::new();
        s.parameters_mut().apply_token("CASEMAPPING=ascii");
        s.touch("Alice", 0);
        assert_eq!(s.find_user("alice").unwrap().display_name(), "Alice");
        assert_eq!(s.find_user("ALICE").unwrap().display_name(), "Alice");
    }
}
