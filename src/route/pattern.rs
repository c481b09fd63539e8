//! Path patterns understood by the default ordering policy and the local transport.
//!
//! A pattern is `*` or a `/`-separated list of segments:
//!
//! - static text (`files`) matches itself
//! - `{name}`, `:name` or `<name>` match exactly one segment and capture it
//! - any segment containing `*` is a wildcard. A trailing wildcard matches zero
//!   or more segments, an inner one matches exactly one.

use crate::error::RouteError;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for matched paths.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One segment of a [`PathPattern`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(Arc<str>),
    Param(Arc<str>),
    Wildcard,
}

impl Segment {
    fn parse(raw: &str, path: &str) -> Result<Self, RouteError> {
        if raw.contains('*') {
            return Ok(Segment::Wildcard);
        }
        let name = raw
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .or_else(|| raw.strip_prefix('<').and_then(|s| s.strip_suffix('>')))
            .or_else(|| raw.strip_prefix(':'));
        match name {
            Some("") => Err(RouteError::InvalidPath {
                path: path.to_string(),
                reason: "path parameter without a name",
            }),
            Some(name) => Ok(Segment::Param(Arc::from(name))),
            None if raw.contains(['{', '}', '<', '>']) => Err(RouteError::InvalidPath {
                path: path.to_string(),
                reason: "unbalanced path parameter delimiters",
            }),
            None => Ok(Segment::Static(Arc::from(raw))),
        }
    }

    /// Specificity rank: lower is more specific.
    ///
    /// A trailing wildcard also matches nothing at all, so it ranks after the
    /// end of a path; an inner one consumes exactly one segment and ranks just
    /// after a parameter.
    pub(crate) fn rank(&self, trailing: bool) -> u8 {
        match self {
            Segment::Static(_) => 0,
            Segment::Param(_) => 1,
            Segment::Wildcard if trailing => TRAILING_WILDCARD_RANK,
            Segment::Wildcard => 2,
        }
    }
}

/// Rank used for the position after the last segment of a path.
pub(crate) const END_RANK: u8 = 3;

const TRAILING_WILDCARD_RANK: u8 = 4;

/// Parsed route path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a route path.
    ///
    /// # Errors
    ///
    /// Fails on an empty path, a path not starting with `/` (other than `*`),
    /// or a malformed parameter segment.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        if raw.is_empty() {
            return Err(RouteError::EmptyPath);
        }
        if raw == "*" {
            return Ok(Self {
                raw: raw.to_string(),
                segments: vec![Segment::Wildcard],
            });
        }
        if !raw.starts_with('/') {
            return Err(RouteError::InvalidPath {
                path: raw.to_string(),
                reason: "path must start with `/`",
            });
        }

        let segments = split_segments(raw)
            .map(|s| Segment::parse(s, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Specificity rank of the segment at `index`, or the end-of-path rank past the end
    pub(crate) fn rank_at(&self, index: usize) -> u8 {
        let trailing = index + 1 == self.segments.len();
        self.segments
            .get(index)
            .map_or(END_RANK, |segment| segment.rank(trailing))
    }

    /// Match a concrete request path, returning the captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        let request: SmallVec<[&str; 16]> = split_segments(path).collect();
        let mut params = ParamVec::new();
        let last = self.segments.len().checked_sub(1);

        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard if Some(idx) == last => return Some(params),
                Segment::Wildcard => {
                    request.get(idx)?;
                }
                Segment::Param(name) => {
                    let value = request.get(idx)?;
                    params.push((Arc::clone(name), (*value).to_string()));
                }
                Segment::Static(text) => {
                    if request.get(idx).copied() != Some(&**text) {
                        return None;
                    }
                }
            }
        }

        (request.len() == self.segments.len()).then_some(params)
    }

    /// `true` when every request matched by `other` is also matched by `self`.
    #[must_use]
    pub fn covers(&self, other: &PathPattern) -> bool {
        covers_from(&self.segments, &other.segments)
    }

    /// `true` when `self` matches a strict superset of the requests `other` matches.
    ///
    /// Registering `self` before `other` would hide `other` from a first-match router.
    #[must_use]
    pub fn shadows(&self, other: &PathPattern) -> bool {
        self.covers(other) && !other.covers(self)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn covers_from(general: &[Segment], specific: &[Segment]) -> bool {
    match (general, specific) {
        ([], []) => true,
        ([Segment::Wildcard], _) => true,
        (_, [Segment::Wildcard]) => false,
        ([], _) | (_, []) => false,
        ([g, g_rest @ ..], [s, s_rest @ ..]) => {
            segment_covers(g, s) && covers_from(g_rest, s_rest)
        }
    }
}

fn segment_covers(general: &Segment, specific: &Segment) -> bool {
    match (general, specific) {
        (Segment::Wildcard, _) => true,
        (Segment::Param(_), Segment::Static(_) | Segment::Param(_)) => true,
        (Segment::Static(a), Segment::Static(b)) => a == b,
        _ => false,
    }
}
