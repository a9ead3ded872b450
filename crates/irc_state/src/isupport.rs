//! Translate ISUPPORT (005) tokens into the typed `Parameters` record. A
//! leading `-` on a key means "reset to default"; integer fields restore
//! "unlimited" and CASEMAPPING restores `rfc1459`.
//!
//! Parse failures never propagate: a bad token is logged and otherwise has
//! no effect, leaving the previous value (or the built-in default) in
//! place.

use std::collections::BTreeMap;

use irc_common::CaseMapping;
use log::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChanModes {
    pub a: Vec<char>,
    pub b: Vec<char>,
    pub c: Vec<char>,
    pub d: Vec<char>,
}

/// The server's advertised capabilities (005/ISUPPORT), with sane defaults
/// for the fields a server may never send.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub awaylen: Option<u32>,
    pub casemapping: CaseMapping,
    casemapping_locked: bool,
    pub chanlimit: BTreeMap<char, Option<u32>>,
    pub chanmodes: ChanModes,
    pub channellen: Option<u32>,
    pub chantypes: Vec<char>,
    pub excepts: Option<char>,
    pub invex: Option<char>,
    pub extban: Option<(char, String)>,
    pub hostlen: Option<u32>,
    pub kicklen: Option<u32>,
    pub maxlist: BTreeMap<char, Option<u32>>,
    pub maxtargets: Option<u32>,
    pub modes: Option<u32>,
    pub network: Option<String>,
    pub nicklen: Option<u32>,
    /// Ordered mode-letter -> prefix-char, preserving server priority order.
    pub prefix: Vec<(char, char)>,
    pub safelist: bool,
    pub silence: Option<u32>,
    pub statusmsg: Vec<char>,
    pub targmax: BTreeMap<String, Option<u32>>,
    pub topiclen: Option<u32>,
    pub userlen: Option<u32>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            awaylen: None,
            casemapping: CaseMapping::Unset,
            casemapping_locked: false,
            chanlimit: BTreeMap::new(),
            chanmodes: ChanModes::default(),
            channellen: None,
            chantypes: vec!['#', '&'],
            excepts: None,
            invex: None,
            extban: None,
            hostlen: None,
            kicklen: None,
            maxlist: BTreeMap::new(),
            maxtargets: None,
            modes: None,
            network: None,
            nicklen: None,
            prefix: vec![('o', '@'), ('v', '+')],
            safelist: false,
            silence: None,
            statusmsg: Vec::new(),
            targmax: BTreeMap::new(),
            topiclen: None,
            userlen: None,
        }
    }
}

impl Parameters {
    /// Feed every token of a single 005 line through the parser.
    pub fn apply_isupport_line(&mut self, tokens: &[String]) {
        for token in tokens {
            self.apply_token(token);
        }
    }

    pub fn apply_token(&mut self, token: &str) {
        let (negate, rest) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let (key, value) = match rest.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (rest, None),
        };
        let key_upper = key.to_ascii_uppercase();
        if let Err(reason) = self.apply(&key_upper, value, negate) {
            warn!("ignoring ISUPPORT token {token:?}: {reason}");
        }
    }

    fn apply(&mut self, key: &str, value: Option<&str>, negate: bool) -> Result<(), String> {
        match key {
            "AWAYLEN" => {
                self.awaylen = int_field(value, negate)?;
                Ok(())
            }
            "CASEMAPPING" => self.apply_casemapping(value, negate),
            "CHANLIMIT" => {
                self.chanlimit = parse_char_limit_map(value.unwrap_or(""))?;
                Ok(())
            }
            "CHANMODES" => {
                self.chanmodes = parse_chanmodes(value.ok_or("missing value")?)?;
                Ok(())
            }
            "CHANNELLEN" => {
                self.channellen = int_field(value, negate)?;
                Ok(())
            }
            "CHANTYPES" => {
                self.chantypes = value.unwrap_or("").chars().collect();
                Ok(())
            }
            "EXCEPTS" => {
                self.excepts = Some(if negate {
                    'e'
                } else {
                    value.and_then(|v| v.chars().next()).unwrap_or('e')
                });
                Ok(())
            }
            "INVEX" => {
                self.invex = Some(if negate {
                    'I'
                } else {
                    value.and_then(|v| v.chars().next()).unwrap_or('I')
                });
                Ok(())
            }
            "EXTBAN" => {
                self.extban = Some(parse_extban(value.ok_or("missing value")?)?);
                Ok(())
            }
            "HOSTLEN" => {
                self.hostlen = int_field(value, negate)?;
                Ok(())
            }
            "KICKLEN" => {
                self.kicklen = int_field(value, negate)?;
                Ok(())
            }
            "MAXLIST" => {
                self.maxlist = parse_char_limit_map(value.unwrap_or(""))?;
                Ok(())
            }
            "MAXTARGETS" => {
                self.maxtargets = int_field(value, negate)?;
                Ok(())
            }
            "MODES" => {
                self.modes = int_field(value, negate)?;
                Ok(())
            }
            "NETWORK" => {
                self.network = value.map(str::to_owned);
                Ok(())
            }
            "NICKLEN" => {
                self.nicklen = int_field(value, negate)?;
                Ok(())
            }
            "PREFIX" => {
                self.prefix = parse_prefix(value.ok_or("missing value")?)?;
                Ok(())
            }
            "SAFELIST" => {
                self.safelist = !negate;
                Ok(())
            }
            "SILENCE" => {
                self.silence = int_field(value, negate)?;
                Ok(())
            }
            "STATUSMSG" => {
                self.statusmsg = value.unwrap_or("").chars().collect();
                Ok(())
            }
            "TARGMAX" => {
                self.targmax = parse_targmax(value.unwrap_or(""))?;
                Ok(())
            }
            "TOPICLEN" => {
                self.topiclen = int_field(value, negate)?;
                Ok(())
            }
            "USERLEN" => {
                self.userlen = int_field(value, negate)?;
                Ok(())
            }
            other => Err(format!("unrecognized token {other:?}")),
        }
    }

    fn apply_casemapping(&mut self, value: Option<&str>, negate: bool) -> Result<(), String> {
        if self.casemapping_locked {
            return Err("CASEMAPPING is write-once for this session".to_owned());
        }
        let mapping = if negate {
            CaseMapping::Rfc1459
        } else {
            CaseMapping::parse(value.ok_or("missing value")?)
                .ok_or_else(|| format!("unknown CASEMAPPING value {value:?}"))?
        };
        self.casemapping = mapping;
        self.casemapping_locked = true;
        Ok(())
    }
}

fn int_field(value: Option<&str>, negate: bool) -> Result<Option<u32>, String> {
    if negate {
        return Ok(None);
    }
    match value {
        Some(v) => v.parse::<u32>().map(Some).map_err(|_| format!("invalid integer {v:?}")),
        None => Err("missing integer value".to_owned()),
    }
}

fn parse_char_limit_map(s: &str) -> Result<BTreeMap<char, Option<u32>>, String> {
    let mut map = BTreeMap::new();
    for part in s.split(',').filter(|p| !p.is_empty()) {
        let (prefixes, limit) = match part.split_once(':') {
            Some((p, n)) if !n.is_empty() => {
                (p, Some(n.parse::<u32>().map_err(|_| format!("invalid limit in {part:?}"))?))
            }
            Some((p, _)) => (p, None),
            None => (part, None),
        };
        for c in prefixes.chars() {
            map.insert(c, limit);
        }
    }
    Ok(map)
}

fn parse_chanmodes(s: &str) -> Result<ChanModes, String> {
    let mut parts = s.splitn(4, ',');
    let a = parts.next().ok_or("missing type A set")?;
    let b = parts.next().ok_or("missing type B set")?;
    let c = parts.next().ok_or("missing type C set")?;
    let d = parts.next().ok_or("missing type D set")?;
    Ok(ChanModes {
        a: a.chars().collect(),
        b: b.chars().collect(),
        c: c.chars().collect(),
        d: d.chars().collect(),
    })
}

fn parse_extban(s: &str) -> Result<(char, String), String> {
    let (prefix, modes) = s.split_once(',').ok_or("expected prefixChar,modes")?;
    Ok((prefix.chars().next().unwrap_or('\0'), modes.to_owned()))
}

/// `^\((?<modes>[A-Za-z]+)\)(?<prefixes>\S+)$`, modes/prefixes of equal length.
fn parse_prefix(s: &str) -> Result<Vec<(char, char)>, String> {
    let rest = s.strip_prefix('(').ok_or("PREFIX must start with '('")?;
    let close = rest.find(')').ok_or("PREFIX missing closing ')'")?;
    let modes = &rest[..close];
    let prefixes = &rest[close + 1..];
    if modes.chars().count() != prefixes.chars().count() {
        return Err(format!(
            "PREFIX modes/prefixes length mismatch ({modes:?} vs {prefixes:?})"
        ));
    }
    Ok(modes.chars().zip(prefixes.chars()).collect())
}

fn parse_targmax(s: &str) -> Result<BTreeMap<String, Option<u32>>, String> {
    let mut map = BTreeMap::new();
    for part in s.split(',').filter(|p| !p.is_empty()) {
        match part.split_once(':') {
            Some((cmd, n)) => {
                let limit = if n.is_empty() {
                    None
                } else {
                    Some(n.parse::<u32>().map_err(|_| format!("invalid TARGMAX limit in {part:?}"))?)
                };
                map.insert(cmd.to_ascii_uppercase(), limit);
            }
            None => {
                map.insert(part.to_ascii_uppercase(), None);
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casemapping_is_write_once() {
        let mut p = Parameters::default();
        p.apply_token("CASEMAPPING=ascii");
        assert_eq!(p.casemapping, CaseMapping::Ascii);
        p.apply_token("CASEMAPPING=rfc1459-strict");
        assert_eq!(p.casemapping, CaseMapping::Ascii, "second assignment must be rejected");
    }

    #[test]
    fn prefix_parses_ordered_mode_to_char_map() {
        let mut p = Parameters::default();
        p.apply_token("PREFIX=(ov)@+");
        assert_eq!(p.prefix, vec![('o', '@'), ('v', '+')]);
    }

    #[test]
    fn prefix_with_mismatched_lengths_is_rejected() {
        let mut p = Parameters::default();
        let before = p.prefix.clone();
        p.apply_token("PREFIX=(ov)@");
        assert_eq!(p.prefix, before, "malformed PREFIX token must not overwrite the existing value");
    }

    #[test]
    fn chanlimit_maps_each_prefix_char_to_limit() {
        let mut p = Parameters::default();
        p.apply_token("CHANLIMIT=#&:25");
        assert_eq!(p.chanlimit.get(&'#'), Some(&Some(25)));
        assert_eq!(p.chanlimit.get(&'&'), Some(&Some(25)));
    }

    #[test]
    fn negated_integer_field_restores_unlimited() {
        let mut p = Parameters::default();
        p.apply_token("NICKLEN=9");
        assert_eq!(p.nicklen, Some(9));
        p.apply_token("-NICKLEN");
        assert_eq!(p.nicklen, None);
    }

    #[test]
    fn unknown_token_is_ignored_without_panic() {
        let mut p = Parameters::default();
        p.apply_token("SOMETHING-NOVEL=1");
    }
}
