//! Transient link proposals.
//!
//! A `Link` is a scored candidate relation between a source inter and a
//! partner, produced by "search links" queries. Links are never stored:
//! callers either apply the single best (lowest gap, stable tie-break by
//! partner creation order) or apply all candidates, per the multiplicity
//! rule of each pass.

use crate::sig::{InterId, RelationKind, Sig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub partner: InterId,
    pub kind: RelationKind,
    pub grade: f64,
    /// Driving gap used for best-of selection, in interline fractions.
    pub gap: f64,
}

impl Link {
    pub fn new(partner: InterId, kind: RelationKind, grade: f64, gap: f64) -> Self {
        Self { partner, kind, grade, gap }
    }

    /// Materialize this proposal as a relation from `source`.
    pub fn apply(&self, sig: &mut Sig, source: InterId) {
        sig.add_relation(source, self.partner, self.kind, self.grade);
    }
}

/// The single best proposal: ascending gap, partner id breaking ties.
pub fn best_link(links: &[Link]) -> Option<Link> {
    links
        .iter()
        .min_by(|a, b| {
            a.gap
                .partial_cmp(&b.gap)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.partner.cmp(&b.partner))
        })
        .copied()
}

/// Apply only the best proposal, if any.
pub fn apply_best(sig: &mut Sig, source: InterId, links: &[Link]) -> Option<Link> {
    let best = best_link(links)?;
    best.apply(sig, source);
    Some(best)
}

/// Apply every proposal.
pub fn apply_all(sig: &mut Sig, source: InterId, links: &[Link]) -> usize {
    for link in links {
        link.apply(sig, source);
    }
    links.len()
}
