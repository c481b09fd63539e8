//! Registration order for routes.
//!
//! Transports that match requests against handlers in registration order need
//! specific routes registered before the general ones that would otherwise
//! swallow their requests. The order is computed once, at attachment.

use super::core::Route;
use std::cmp::Ordering;

/// Total order over routes used at registration time.
///
/// Implementations must be deterministic: equal inputs in any order sort to
/// the same sequence.
pub trait RouteOrdering<C>: Send + Sync {
    fn compare(&self, a: &Route<C>, b: &Route<C>) -> Ordering;

    fn sort(&self, routes: &mut [Route<C>]) {
        routes.sort_by(|a, b| self.compare(a, b));
    }
}

/// Default policy: most specific path first.
///
/// Paths are compared segment by segment on their specificity rank: static,
/// parameter, inner wildcard, end of path, trailing wildcard. Ties fall back
/// to the raw path, the method list and finally the route id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecificityOrdering;

impl<C> RouteOrdering<C> for SpecificityOrdering {
    fn compare(&self, a: &Route<C>, b: &Route<C>) -> Ordering {
        let (pa, pb) = (a.pattern(), b.pattern());
        let depth = pa.segments().len().max(pb.segments().len());

        (0..depth)
            .map(|i| pa.rank_at(i).cmp(&pb.rank_at(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path().cmp(b.path()))
            .then_with(|| a.methods().cmp(b.methods()))
            .then_with(|| a.id().cmp(&b.id()))
    }
}
