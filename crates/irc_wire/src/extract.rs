//! The extractor framework the unmarshaller's per-command parsers are built
//! from: a cursor over an already-split parameter list plus a small
//! conditional-dispatch DSL, shared so each per-command parser doesn't
//! hand-roll its own default/record bookkeeping.
//!
//! Each per-command parser pulls fields off a [`Params`] cursor in
//! declaration order. Required fields that are missing don't fail the whole
//! message: they record their name on the shared [`ExtractCtx`] and fall
//! back to a caller-supplied default, so one bad parameter degrades the
//! result to `Command::ParseError` instead of discarding it.

/// Accumulates the names of parameters that fell back to a default during a
/// single message's extraction. Non-empty at the end means the unmarshaller
/// downgrades the parsed command to `Command::ParseError`.
#[derive(Debug, Default)]
pub struct ExtractCtx {
    pub error_parameters: Vec<String>,
}

impl ExtractCtx {
    pub fn record(&mut self, name: &str) {
        self.error_parameters.push(name.to_owned());
    }

    pub fn is_clean(&self) -> bool {
        self.error_parameters.is_empty()
    }
}

/// A cursor over one command's parameter slice. Plays the role of the
/// "planner": callers pull required fields first (consuming the minimum
/// each extractor needs), then optional/greedy fields take whatever is
/// left.
pub struct Params<'a> {
    items: &'a [String],
    pos: usize,
}

impl<'a> Params<'a> {
    pub fn new(items: &'a [String]) -> Self {
        Params { items, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.items.len() - self.pos
    }

    /// Pull the next parameter. On shortage, records `name` on `ctx` and
    /// returns `default` rather than failing extraction outright.
    pub fn required(
        &mut self,
        name: &str,
        default: impl Into<String>,
        ctx: &mut ExtractCtx,
    ) -> String {
        match self.items.get(self.pos) {
            Some(v) => {
                self.pos += 1;
                v.clone()
            }
            None => {
                ctx.record(name);
                default.into()
            }
        }
    }

    /// Pull the next parameter if present. Absence here is not an error —
    /// this models a genuinely optional trailing field (e.g. a PART reason).
    pub fn optional(&mut self) -> Option<String> {
        let v = self.items.get(self.pos).cloned();
        if v.is_some() {
            self.pos += 1;
        }
        v
    }

    /// Consume every remaining parameter as a greedy/variadic tail.
    pub fn rest(&mut self) -> Vec<String> {
        let rest = self.items[self.pos..].to_vec();
        self.pos = self.items.len();
        rest
    }

    /// A value splitter: map one wire parameter to two logical fields (e.g.
    /// the WHO reply's trailing `<hopcount> <realname>`). On shortage or a
    /// splitter that can't find the expected shape, records `name` and
    /// returns `default`.
    pub fn split(
        &mut self,
        name: &str,
        splitter: impl FnOnce(&str) -> Option<(String, String)>,
        default: (String, String),
        ctx: &mut ExtractCtx,
    ) -> (String, String) {
        match self.items.get(self.pos) {
            Some(raw) => {
                self.pos += 1;
                match splitter(raw) {
                    Some(pair) => pair,
                    None => {
                        ctx.record(name);
                        default
                    }
                }
            }
            None => {
                ctx.record(name);
                default
            }
        }
    }
}

/// `<hopcount> <realname>` splitter used by the WHO reply (352).
pub fn split_hopcount_realname(s: &str) -> Option<(String, String)> {
    s.split_once(' ')
        .map(|(h, r)| (h.to_owned(), r.to_owned()))
}

/// `ifIndexEquals(i, lit, ...)`: branch on whether `params[i] == lit`.
pub fn if_index_equals<T>(
    params: &[String],
    index: usize,
    lit: &str,
    then: impl FnOnce() -> T,
    otherwise: impl FnOnce() -> T,
) -> T {
    if params.get(index).map(String::as_str) == Some(lit) {
        then()
    } else {
        otherwise()
    }
}

/// `ifIndex(i, predicate, injector)`: branch on an arbitrary predicate over
/// `params[i]`, passing the matched value through to `then`.
pub fn if_index<T>(
    params: &[String],
    index: usize,
    predicate: impl Fn(&str) -> bool,
    then: impl FnOnce(&str) -> T,
    otherwise: impl FnOnce() -> T,
) -> T {
    match params.get(index) {
        Some(v) if predicate(v) => then(v),
        _ => otherwise(),
    }
}

/// `ifNoneMatch(injector)`: the fallback branch of the dispatch DSL, used
/// when every other condition failed to match.
pub fn if_none_match<T>(default: impl FnOnce() -> T) -> T {
    default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_falls_back_and_records_name_on_shortage() {
        let items: Vec<String> = vec!["a".into()];
        let mut params = Params::new(&items);
        let mut ctx = ExtractCtx::default();
        assert_eq!(params.required("first", "def", &mut ctx), "a");
        assert_eq!(params.required("second", "def", &mut ctx), "def");
        assert_eq!(ctx.error_parameters, vec!["second".to_owned()]);
    }

    #[test]
    fn split_reports_failure_name_on_bad_shape() {
        let items: Vec<String> = vec!["nohyphenhere".into()];
        let mut params = Params::new(&items);
        let mut ctx = ExtractCtx::default();
        let (h, r) = params.split(
            "who.hopcount_realname",
            split_hopcount_realname,
            ("0".into(), "".into()),
            &mut ctx,
        );
        assert_eq!((h.as_str(), r.as_str()), ("0", ""));
        assert_eq!(ctx.error_parameters, vec!["who.hopcount_realname".to_owned()]);
    }

    #[test]
    fn split_hopcount_realname_splits_on_first_space() {
        assert_eq!(
            split_hopcount_realname("3 Alice Smith"),
            Some(("3".to_owned(), "Alice Smith".to_owned()))
        );
    }

    #[test]
    fn if_index_equals_dispatches() {
        let params = vec!["END".to_owned()];
        let r = if_index_equals(&params, 0, "END", || "end", || "other");
        assert_eq!(r, "end");
    }
}
