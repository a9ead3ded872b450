//! The enumerated IRCv3 capability type and the three-set bookkeeping
//! (server-advertised / requested / active) plus the `receiving` flag for
//! multi-line LS/LIST.
//!
//! `Capability::Custom` absorbs any name the client doesn't recognize;
//! the engine's negotiation handler treats `Custom` as "unknown" and skips
//! it rather than tracking it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    MultiPrefix,
    Sasl,
    AccountNotify,
    AwayNotify,
    ExtendedJoin,
    Monitor,
    AccountTag,
    Batch,
    CapNotify,
    ChgHost,
    EchoMessage,
    InviteNotify,
    ServerTime,
    UserhostInNames,
    SetName,
    MessageTags,
    Msgid,
    LabeledResponse,
    StandardReplies,
    Sts,
    Custom(String),
}

impl Capability {
    pub fn is_known(&self) -> bool {
        !matches!(self, Capability::Custom(_))
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Capability::MultiPrefix => "multi-prefix",
            Capability::Sasl => "sasl",
            Capability::AccountNotify => "account-notify",
            Capability::AwayNotify => "away-notify",
            Capability::ExtendedJoin => "extended-join",
            Capability::Monitor => "monitor",
            Capability::AccountTag => "account-tag",
            Capability::Batch => "batch",
            Capability::CapNotify => "cap-notify",
            Capability::ChgHost => "chghost",
            Capability::EchoMessage => "echo-message",
            Capability::InviteNotify => "invite-notify",
            Capability::ServerTime => "server-time",
            Capability::UserhostInNames => "userhost-in-names",
            Capability::SetName => "setname",
            Capability::MessageTags => "message-tags",
            Capability::Msgid => "msgid",
            Capability::LabeledResponse => "labeled-response",
            Capability::StandardReplies => "standard-replies",
            Capability::Sts => "sts",
            Capability::Custom(s) => s,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "multi-prefix" => Capability::MultiPrefix,
            "sasl" => Capability::Sasl,
            "account-notify" => Capability::AccountNotify,
            "away-notify" => Capability::AwayNotify,
            "extended-join" => Capability::ExtendedJoin,
            "monitor" => Capability::Monitor,
            "account-tag" => Capability::AccountTag,
            "batch" => Capability::Batch,
            "cap-notify" => Capability::CapNotify,
            "chghost" => Capability::ChgHost,
            "echo-message" => Capability::EchoMessage,
            "invite-notify" => Capability::InviteNotify,
            "server-time" => Capability::ServerTime,
            "userhost-in-names" => Capability::UserhostInNames,
            "setname" => Capability::SetName,
            "message-tags" => Capability::MessageTags,
            "msgid" => Capability::Msgid,
            "labeled-response" => Capability::LabeledResponse,
            "standard-replies" => Capability::StandardReplies,
            "sts" => Capability::Sts,
            other => Capability::Custom(other.to_owned()),
        }
    }
}

/// The three capability sets plus the multi-line negotiation flag.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    server: BTreeMap<Capability, Option<String>>,
    requested: BTreeSet<Capability>,
    active: BTreeMap<Capability, Option<String>>,
    receiving: bool,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_server(&mut self, cap: Capability, value: Option<String>) {
        self.server.insert(cap, value);
    }

    pub fn remove_server(&mut self, cap: &Capability) {
        self.server.remove(cap);
        self.requested.remove(cap);
        self.active.remove(cap);
    }

    pub fn add_requested(&mut self, cap: Capability) {
        self.requested.insert(cap);
    }

    pub fn remove_requested(&mut self, cap: &Capability) {
        self.requested.remove(cap);
    }

    /// Promote `cap` from requested to active, using the server-provided
    /// value. A no-op if the server never advertised it.
    pub fn enable(&mut self, cap: &Capability) {
        if let Some(value) = self.server.get(cap).cloned() {
            self.requested.remove(cap);
            self.active.insert(cap.clone(), value);
        }
    }

    pub fn clear_active(&mut self) {
        self.active.clear();
    }

    pub fn clear_server(&mut self) {
        self.server.clear();
    }

    pub fn is_active(&self, cap: &Capability) -> bool {
        self.active.contains_key(cap)
    }

    pub fn is_active_with(&self, cap: &Capability, predicate: impl Fn(Option<&str>) -> bool) -> bool {
        self.active
            .get(cap)
            .map(|v| predicate(v.as_deref()))
            .unwrap_or(false)
    }

    pub fn server_value(&self, cap: &Capability) -> Option<Option<&str>> {
        self.server.get(cap).map(|v| v.as_deref())
    }

    pub fn is_server_advertised(&self, cap: &Capability) -> bool {
        self.server.contains_key(cap)
    }

    pub fn requested_is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    pub fn requested(&self) -> impl Iterator<Item = &Capability> {
        self.requested.iter()
    }

    pub fn server_caps(&self) -> impl Iterator<Item = &Capability> {
        self.server.keys()
    }

    pub fn start_receiving(&mut self) {
        self.receiving = true;
    }

    pub fn stop_receiving(&mut self) {
        self.receiving = false;
    }

    pub fn receiving(&self) -> bool {
        self.receiving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_is_a_no_op_when_not_server_advertised() {
        let mut caps = CapabilitySet::new();
        caps.add_requested(Capability::ServerTime);
        caps.enable(&Capability::ServerTime);
        assert!(!caps.is_active(&Capability::ServerTime));
    }

    #[test]
    fn enable_promotes_requested_to_active_with_server_value() {
        let mut caps = CapabilitySet::new();
        caps.add_server(Capability::Sasl, Some("PLAIN".to_owned()));
        caps.add_requested(Capability::Sasl);
        caps.enable(&Capability::Sasl);
        assert!(caps.is_active(&Capability::Sasl));
        assert!(caps.requested_is_empty());
        assert!(caps.is_active_with(&Capability::Sasl, |v| v == Some("PLAIN")));
    }

    #[test]
    fn remove_server_clears_all_three_sets() {
        let mut caps = CapabilitySet::new();
        caps.add_server(Capability::Batch, None);
        caps.add_requested(Capability::Batch);
        caps.enable(&Capability::Batch);
        caps.remove_server(&Capability::Batch);
        assert!(!caps.is_active(&Capability::Batch));
        assert!(!caps.is_server_advertised(&Capability::Batch));
    }

    #[test]
    fn unknown_capability_name_is_custom() {
        let cap = Capability::from("draft/some-experiment");
        assert!(!cap.is_known());
    }
}
