//! # Glyph Clustering
//!
//! Groups spatially-connected candidate glyphs into small compounds so that
//! symbol pieces split by segmentation (a broken flat, the two blobs of a
//! natural sign) can be evaluated jointly.
//!
//! Connectivity uses rectangle gap distance with a fat-box prefilter and an
//! abscissa early exit; connected sets small enough are decomposed into
//! every connected sub-compound within the symbol size sanity bounds.

use hashbrown::HashSet;
use tracing::debug;

use crate::model::{Glyph, GlyphId, Params, Rect, Scale};

/// A candidate symbol: one merged glyph plus the pieces it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    pub glyph: Glyph,
    pub parts: Vec<GlyphId>,
}

pub struct GlyphClusterer<'a> {
    params: &'a Params,
    scale: &'a Scale,
}

impl<'a> GlyphClusterer<'a> {
    pub fn new(params: &'a Params, scale: &'a Scale) -> Self {
        Self { params, scale }
    }

    /// Build all compounds worth a joint evaluation.
    pub fn clusters(&self, glyphs: &[Glyph]) -> Vec<Compound> {
        let mut order: Vec<usize> = (0..glyphs.len()).collect();
        order.sort_by(|&a, &b| {
            glyphs[a]
                .bounds
                .x
                .partial_cmp(&glyphs[b].bounds.x)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let max_gap = self.scale.to_pixels(self.params.cluster_max_gap);
        let edges = self.build_edges(glyphs, &order, max_gap);
        let components = connected_components(glyphs.len(), &edges);
        debug!(glyphs = glyphs.len(), components = components.len(), "glyph clustering");

        let mut compounds = Vec::new();
        for component in components {
            if component.len() == 1 {
                let g = &glyphs[component[0]];
                compounds.push(Compound { glyph: g.clone(), parts: vec![g.id] });
            } else if component.len() <= self.params.cluster_max_parts {
                self.decompose(glyphs, &component, &edges, &mut compounds);
            } else {
                // Too many pieces for subset enumeration; evaluate each alone.
                debug!(size = component.len(), "oversized cluster, no joint evaluation");
                for &i in &component {
                    let g = &glyphs[i];
                    compounds.push(Compound { glyph: g.clone(), parts: vec![g.id] });
                }
            }
        }
        compounds
    }

    fn build_edges(
        &self,
        glyphs: &[Glyph],
        order: &[usize],
        max_gap: f64,
    ) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (pos, &i) in order.iter().enumerate() {
            let fat_box = glyphs[i].bounds.grown(max_gap, max_gap);
            let x_break = fat_box.right();
            for &j in &order[pos + 1..] {
                let other = glyphs[j].bounds;
                if other.x > x_break {
                    break;
                }
                if !fat_box.intersects(&other) {
                    continue;
                }
                if glyphs[i].bounds.gap_to(&other) <= max_gap {
                    edges.push((i, j));
                }
            }
        }
        edges
    }

    /// Emit every connected, size-sane subset of a small component.
    fn decompose(
        &self,
        glyphs: &[Glyph],
        component: &[usize],
        edges: &[(usize, usize)],
        out: &mut Vec<Compound>,
    ) {
        let max_width = self.scale.to_pixels(self.params.max_symbol_width);
        let max_height = self.scale.to_pixels(self.params.max_symbol_height);
        let n = component.len();

        for mask in 1u32..(1 << n) {
            let subset: Vec<usize> = (0..n)
                .filter(|bit| mask & (1 << bit) != 0)
                .map(|bit| component[bit])
                .collect();
            if !subset_connected(&subset, edges) {
                continue;
            }
            let bounds: Rect = subset
                .iter()
                .map(|&i| glyphs[i].bounds)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default();
            if bounds.width > max_width || bounds.height > max_height {
                continue;
            }
            let parts: Vec<&Glyph> = subset.iter().map(|&i| &glyphs[i]).collect();
            out.push(Compound {
                glyph: Glyph::compound_of(&parts),
                parts: parts.iter().map(|g| g.id).collect(),
            });
        }
    }
}

fn connected_components(count: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut adj = vec![Vec::new(); count];
    for &(a, b) in edges {
        adj[a].push(b);
        adj[b].push(a);
    }
    let mut seen: HashSet<usize> = HashSet::new();
    let mut components = Vec::new();
    for start in 0..count {
        if seen.contains(&start) {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        seen.insert(start);
        while let Some(node) = stack.pop() {
            component.push(node);
            for &next in &adj[node] {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

fn subset_connected(subset: &[usize], edges: &[(usize, usize)]) -> bool {
    if subset.len() <= 1 {
        return true;
    }
    let members: HashSet<usize> = subset.iter().copied().collect();
    let mut seen: HashSet<usize> = HashSet::new();
    let mut stack = vec![subset[0]];
    seen.insert(subset[0]);
    while let Some(node) = stack.pop() {
        for &(a, b) in edges {
            let next = if a == node { b } else if b == node { a } else { continue };
            if members.contains(&next) && seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen.len() == subset.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GlyphId;

    fn glyph(id: u64, x: f64, y: f64) -> Glyph {
        Glyph::new(GlyphId(id), Rect::new(x, y, 4.0, 4.0), 16)
    }

    #[test]
    fn far_glyphs_stay_isolated() {
        let params = Params::default();
        let scale = Scale::new(20.0);
        let glyphs = vec![glyph(1, 0.0, 0.0), glyph(2, 100.0, 0.0)];

        let compounds = GlyphClusterer::new(&params, &scale).clusters(&glyphs);
        assert_eq!(compounds.len(), 2);
        assert!(compounds.iter().all(|c| c.parts.len() == 1));
    }

    #[test]
    fn close_pair_yields_joint_compounds() {
        let params = Params::default();
        let scale = Scale::new(20.0);
        // 6px apart: within the 0.5-interline (10px) gap.
        let glyphs = vec![glyph(1, 0.0, 0.0), glyph(2, 10.0, 0.0)];

        let compounds = GlyphClusterer::new(&params, &scale).clusters(&glyphs);
        // {1}, {2}, {1,2}
        assert_eq!(compounds.len(), 3);
        assert!(compounds.iter().any(|c| c.parts.len() == 2));
    }

    #[test]
    fn disconnected_subset_not_emitted() {
        let params = Params::default();
        let scale = Scale::new(20.0);
        // Chain a - b - c: subset {a, c} is not connected.
        let glyphs = vec![glyph(1, 0.0, 0.0), glyph(2, 10.0, 0.0), glyph(3, 20.0, 0.0)];

        let compounds = GlyphClusterer::new(&params, &scale).clusters(&glyphs);
        let has_ac_only = compounds.iter().any(|c| {
            c.parts == vec![GlyphId(1), GlyphId(3)]
        });
        assert!(!has_ac_only);
        // But the full chain is there.
        assert!(compounds.iter().any(|c| c.parts.len() == 3));
    }

    #[test]
    fn oversized_compound_rejected() {
        let params = Params::default();
        let scale = Scale::new(10.0);
        // Two tall glyphs whose union exceeds the max symbol height.
        let a = Glyph::new(GlyphId(1), Rect::new(0.0, 0.0, 4.0, 60.0), 100);
        let b = Glyph::new(GlyphId(2), Rect::new(2.0, 62.0, 4.0, 60.0), 100);

        let compounds = GlyphClusterer::new(&params, &scale).clusters(&[a, b]);
        assert!(compounds.iter().all(|c| c.parts.len() == 1));
    }
}
