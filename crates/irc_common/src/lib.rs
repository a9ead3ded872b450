//! Common types shared by the IRC protocol engine crates.
//!
//! Unlike plain strings, [`ChanName`] keeps the server's original casing for
//! display while letting callers normalize it for lookups via a
//! [`CaseMapping`] (casemapping is a per-session, server-negotiated rule, not
//! a fixed property of the name itself — see `irc_state` for where it lives).

pub mod casemap;

pub use casemap::CaseMapping;

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Channel names per RFC 2812 section 1.3. Equality/hash here are *exact*
/// (original casing); case-insensitive lookups go through
/// `CaseMapping::normalize` at the call site, never through `Eq`/`Hash` on
/// this type, since the mapping rule can differ per session and is not known
/// statically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChanName(String);

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ChanNameRef(str);

impl Deref for ChanName {
    type Target = ChanNameRef;

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl AsRef<ChanNameRef> for ChanName {
    fn as_ref(&self) -> &ChanNameRef {
        ChanNameRef::new(self.0.as_ref())
    }
}

impl Borrow<ChanNameRef> for ChanName {
    fn borrow(&self) -> &ChanNameRef {
        self.as_ref()
    }
}

impl ChanName {
    pub fn new(name: impl Into<String>) -> Self {
        ChanName(name.into())
    }

    pub fn display(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ChanNameRef {
    pub fn new(name: &str) -> &Self {
        unsafe { &*(name as *const str as *const ChanNameRef) }
    }

    pub fn display(&self) -> &str {
        &self.0
    }
}

impl ToOwned for ChanNameRef {
    type Owned = ChanName;

    fn to_owned(&self) -> Self::Owned {
        ChanName(self.0.to_owned())
    }
}

impl fmt::Display for ChanNameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of channel-prefix characters assumed before ISUPPORT CHANTYPES
/// arrives.
pub const DEFAULT_CHANTYPES: &[char] = &['#', '&'];

/// Best-effort check for "does this token look like a channel name", using
/// the default prefix set rather than the session's negotiated CHANTYPES.
/// Useful for a caller that needs to classify a target before ISUPPORT has
/// arrived; once it has, prefer the session's own `chantypes`.
pub fn looks_like_channel(s: &str) -> bool {
    s.starts_with(|c: char| DEFAULT_CHANTYPES.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_preserves_casing() {
        let c = ChanName::new("#Rust-Lang".to_string());
        assert_eq!(c.display(), "#Rust-Lang");
    }

    #[test]
    fn chan_name_ref_reinterprets_str() {
        let s = "#foo";
        let r = ChanNameRef::new(s);
        assert_eq!(r.display(), "#foo");
        assert_eq!(r.to_owned(), ChanName::new("#foo".to_string()));
    }

    #[test]
    fn looks_like_channel_checks_default_prefixes() {
        assert!(looks_like_channel("#general"));
        assert!(looks_like_channel("&local"));
        assert!(!looks_like_channel("nickname"));
    }
}
