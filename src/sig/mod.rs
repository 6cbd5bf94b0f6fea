//! # SIG — System Interpretation Graph
//!
//! Per-system graph of typed hypothesis nodes (inters) and typed edges
//! (relations, exclusions). Inters live in an arena addressed by stable
//! `InterId` handles; removal tombstones a handle instead of freeing it, so
//! iteration never invalidates.
//!
//! The sig is confined to one system's execution context: no locking inside.

pub mod inter;
pub mod relation;

use hashbrown::HashSet;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::model::Rect;

pub use inter::{Inter, InterId, InterKind, SentenceRole};
pub use relation::{Exclusion, Relation, RelationId, RelationKind};

/// The hypothesis graph of one system.
#[derive(Debug, Default)]
pub struct Sig {
    inters: Vec<Inter>,
    relations: Vec<Relation>,
    exclusions: Vec<Exclusion>,
    /// Per-inter relation handles, both directions.
    rel_adj: Vec<SmallVec<[RelationId; 4]>>,
    /// Per-inter exclusion indexes.
    excl_adj: Vec<SmallVec<[u32; 2]>>,
}

impl Sig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Vertices
    // ========================================================================

    /// Insert an inter and return its handle.
    pub fn add_inter(&mut self, inter: Inter) -> InterId {
        let id = InterId(self.inters.len() as u32);
        if inter.tracked {
            info!(%id, kind = ?inter.kind, grade = inter.grade, "tracked inter created");
        } else {
            debug!(%id, kind = ?inter.kind, "inter created");
        }
        self.inters.push(inter);
        self.rel_adj.push(SmallVec::new());
        self.excl_adj.push(SmallVec::new());
        id
    }

    pub fn inter(&self, id: InterId) -> &Inter {
        &self.inters[id.0 as usize]
    }

    pub fn inter_mut(&mut self, id: InterId) -> &mut Inter {
        &mut self.inters[id.0 as usize]
    }

    pub fn is_alive(&self, id: InterId) -> bool {
        self.inters[id.0 as usize].alive
    }

    /// Tombstone an inter and detach all its edges.
    pub fn remove_inter(&mut self, id: InterId) {
        let slot = id.0 as usize;
        if !self.inters[slot].alive {
            return;
        }
        if self.inters[slot].tracked {
            info!(%id, kind = ?self.inters[slot].kind, "tracked inter removed");
        } else {
            debug!(%id, "inter removed");
        }
        self.inters[slot].alive = false;
        for rid in std::mem::take(&mut self.rel_adj[slot]) {
            self.relations[rid.0 as usize].alive = false;
        }
        for ei in std::mem::take(&mut self.excl_adj[slot]) {
            self.exclusions[ei as usize].alive = false;
        }
    }

    /// All alive inters of the given kind, in creation order.
    pub fn inters_of_kind(&self, kind: InterKind) -> Vec<InterId> {
        self.inters_where(|inter| inter.kind == kind)
    }

    /// All alive inters matching a predicate, in creation order.
    pub fn inters_where(&self, pred: impl Fn(&Inter) -> bool) -> Vec<InterId> {
        self.inters
            .iter()
            .enumerate()
            .filter(|(_, inter)| inter.alive && pred(inter))
            .map(|(i, _)| InterId(i as u32))
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.inters.iter().filter(|i| i.alive).count()
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Insert a typed edge. Idempotent: an alive edge of the same kind
    /// between the same pair (either direction) is returned unchanged, and a
    /// source already carrying an edge of a single-per-source kind keeps the
    /// edge it has.
    pub fn add_relation(
        &mut self,
        src: InterId,
        dst: InterId,
        kind: RelationKind,
        grade: f64,
    ) -> RelationId {
        debug_assert!(self.is_alive(src) && self.is_alive(dst));
        if let Some(existing) = self.find_relation(src, dst, kind) {
            return existing;
        }
        if kind.single_per_source() {
            let carried = self.rel_adj[src.0 as usize].iter().copied().find(|rid| {
                let rel = &self.relations[rid.0 as usize];
                rel.alive && rel.kind == kind && rel.src == src
            });
            if let Some(existing) = carried {
                return existing;
            }
        }
        let rid = RelationId(self.relations.len() as u32);
        self.relations.push(Relation { kind, src, dst, grade, alive: true });
        self.rel_adj[src.0 as usize].push(rid);
        self.rel_adj[dst.0 as usize].push(rid);
        debug!(%src, %dst, ?kind, grade, "relation added");
        rid
    }

    fn find_relation(&self, a: InterId, b: InterId, kind: RelationKind) -> Option<RelationId> {
        self.rel_adj[a.0 as usize]
            .iter()
            .copied()
            .find(|rid| {
                let rel = &self.relations[rid.0 as usize];
                rel.alive
                    && rel.kind == kind
                    && ((rel.src == a && rel.dst == b) || (rel.src == b && rel.dst == a))
            })
    }

    pub fn relation(&self, rid: RelationId) -> &Relation {
        &self.relations[rid.0 as usize]
    }

    /// Alive relation handles touching the inter.
    pub fn relations_of(&self, id: InterId) -> Vec<RelationId> {
        self.rel_adj[id.0 as usize]
            .iter()
            .copied()
            .filter(|rid| self.relations[rid.0 as usize].alive)
            .collect()
    }

    pub fn relations_of_kind(&self, id: InterId, kind: RelationKind) -> Vec<RelationId> {
        self.relations_of(id)
            .into_iter()
            .filter(|rid| self.relations[rid.0 as usize].kind == kind)
            .collect()
    }

    pub fn has_relation(&self, id: InterId, kind: RelationKind) -> bool {
        !self.relations_of_kind(id, kind).is_empty()
    }

    /// The inter on the other end of a relation.
    pub fn opposite(&self, rid: RelationId, id: InterId) -> InterId {
        let rel = &self.relations[rid.0 as usize];
        if rel.src == id { rel.dst } else { rel.src }
    }

    pub fn remove_relation(&mut self, rid: RelationId) {
        self.relations[rid.0 as usize].alive = false;
    }

    /// Drop every alive edge of the kind attached to the inter.
    pub fn remove_relations_of_kind(&mut self, id: InterId, kind: RelationKind) {
        for rid in self.relations_of_kind(id, kind) {
            self.relations[rid.0 as usize].alive = false;
        }
    }

    // ========================================================================
    // Exclusions
    // ========================================================================

    /// Mark two inters as mutually incompatible. Idempotent.
    pub fn add_exclusion(&mut self, a: InterId, b: InterId) {
        debug_assert!(a != b);
        let exists = self.excl_adj[a.0 as usize].iter().any(|&ei| {
            let e = &self.exclusions[ei as usize];
            e.alive && ((e.a == a && e.b == b) || (e.a == b && e.b == a))
        });
        if exists {
            return;
        }
        let ei = self.exclusions.len() as u32;
        self.exclusions.push(Exclusion { a, b, alive: true });
        self.excl_adj[a.0 as usize].push(ei);
        self.excl_adj[b.0 as usize].push(ei);
        debug!(%a, %b, "exclusion added");
    }

    pub fn exclusions_of(&self, id: InterId) -> Vec<InterId> {
        self.excl_adj[id.0 as usize]
            .iter()
            .filter_map(|&ei| {
                let e = &self.exclusions[ei as usize];
                if !e.alive {
                    return None;
                }
                Some(if e.a == id { e.b } else { e.a })
            })
            .collect()
    }

    /// Resolve every exclusion in favor of the higher grade; the earlier
    /// created inter wins ties. Returns the number of removed inters.
    pub fn reduce(&mut self) -> usize {
        let mut removed = 0;
        let mut cursor = 0;
        while cursor < self.exclusions.len() {
            let e = &self.exclusions[cursor];
            if e.alive && self.is_alive(e.a) && self.is_alive(e.b) {
                let (a, b) = (e.a, e.b);
                let ga = self.inter(a).grade;
                let gb = self.inter(b).grade;
                let loser = if gb > ga { a } else { b };
                self.remove_inter(loser);
                removed += 1;
                // Removal may have revived earlier-skipped conflicts' winners;
                // rescan from the start for a deterministic fixpoint.
                cursor = 0;
                continue;
            }
            cursor += 1;
        }
        if removed > 0 {
            debug!(removed, "exclusions reduced");
        }
        removed
    }

    // ========================================================================
    // Geometry queries
    // ========================================================================

    /// Among `sorted` (ascending abscissa), the alive inters whose bounds
    /// intersect `lu_box`. Scanning stops once abscissa passes the box.
    pub fn intersected_inters(&self, sorted: &[InterId], lu_box: &Rect) -> Vec<InterId> {
        let mut found = Vec::new();
        for &id in sorted {
            if !self.is_alive(id) {
                continue;
            }
            let bounds = self.inter(id).bounds;
            if bounds.x > lu_box.right() {
                break;
            }
            if bounds.intersects(lu_box) {
                found.push(id);
            }
        }
        found
    }

    /// Sort inter handles by ascending abscissa, creation order on ties.
    pub fn sort_by_abscissa(&self, ids: &mut [InterId]) {
        ids.sort_by(|&a, &b| {
            self.inter(a)
                .bounds
                .x
                .partial_cmp(&self.inter(b).bounds.x)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
    }

    /// Alive inters overlapping the box, except those in `except`.
    pub fn overlapping_inters(&self, lu_box: &Rect, except: &HashSet<InterId>) -> Vec<InterId> {
        self.inters_where(|_| true)
            .into_iter()
            .filter(|id| !except.contains(id) && self.inter(*id).bounds.intersects(lu_box))
            .collect()
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// JSON snapshot of the alive part of the graph, for debug dumps.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "inters": self
                .inters
                .iter()
                .enumerate()
                .filter(|(_, i)| i.alive)
                .map(|(n, i)| (InterId(n as u32), i))
                .collect::<Vec<_>>(),
            "relations": self.relations.iter().filter(|r| r.alive).collect::<Vec<_>>(),
            "exclusions": self.exclusions.iter().filter(|e| e.alive).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rect;

    fn inter_at(kind: InterKind, grade: f64, x: f64) -> Inter {
        Inter::new(kind, grade, Rect::new(x, 0.0, 4.0, 4.0))
    }

    #[test]
    fn removal_detaches_edges() {
        let mut sig = Sig::new();
        let a = sig.add_inter(inter_at(InterKind::RepeatDot, 0.8, 0.0));
        let b = sig.add_inter(inter_at(InterKind::Barline, 0.9, 6.0));
        sig.add_relation(a, b, RelationKind::RepeatDotBar, 0.7);

        sig.remove_inter(a);
        assert!(!sig.is_alive(a));
        assert!(sig.relations_of(b).is_empty());
    }

    #[test]
    fn add_relation_is_idempotent() {
        let mut sig = Sig::new();
        let a = sig.add_inter(inter_at(InterKind::RepeatDot, 0.8, 0.0));
        let b = sig.add_inter(inter_at(InterKind::RepeatDot, 0.8, 0.0));
        let r1 = sig.add_relation(a, b, RelationKind::RepeatDotPair, 1.0);
        let r2 = sig.add_relation(b, a, RelationKind::RepeatDotPair, 1.0);
        assert_eq!(r1, r2);
        assert_eq!(sig.relations_of(a).len(), 1);
        assert_eq!(sig.relation(r1).grade, 1.0);
    }

    #[test]
    fn reduce_keeps_higher_grade() {
        let mut sig = Sig::new();
        let weak = sig.add_inter(inter_at(InterKind::AugmentationDot, 0.4, 0.0));
        let strong = sig.add_inter(inter_at(InterKind::RepeatDot, 0.8, 0.0));
        sig.add_exclusion(weak, strong);
        assert_eq!(sig.exclusions_of(weak), vec![strong]);

        assert_eq!(sig.reduce(), 1);
        assert!(!sig.is_alive(weak));
        assert!(sig.is_alive(strong));
    }

    #[test]
    fn reduce_tie_keeps_earlier_creation() {
        let mut sig = Sig::new();
        let first = sig.add_inter(inter_at(InterKind::RepeatDot, 0.5, 0.0));
        let second = sig.add_inter(inter_at(InterKind::AugmentationDot, 0.5, 0.0));
        sig.add_exclusion(first, second);

        sig.reduce();
        assert!(sig.is_alive(first));
        assert!(!sig.is_alive(second));
    }

    #[test]
    fn snapshot_skips_dead_inters() {
        let mut sig = Sig::new();
        sig.add_inter(inter_at(InterKind::Head, 0.8, 0.0));
        let dead = sig.add_inter(inter_at(InterKind::Head, 0.8, 10.0));
        sig.remove_inter(dead);

        let snap = sig.snapshot();
        assert_eq!(snap["inters"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn intersected_inters_early_exit() {
        let mut sig = Sig::new();
        let ids: Vec<_> = (0..5)
            .map(|i| sig.add_inter(inter_at(InterKind::Head, 0.8, f64::from(i) * 10.0)))
            .collect();
        let lu_box = Rect::new(8.0, 0.0, 8.0, 4.0);
        let hits = sig.intersected_inters(&ids, &lu_box);
        assert_eq!(hits, vec![ids[1]]);
    }
}
