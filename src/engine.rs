//! # Symbol Engine
//!
//! Top-level driver: clusters the candidate glyphs of a system, runs every
//! compound through the classifier, materializes inters through the factory,
//! then the deferred dot checks, the linker battery and the final exclusion
//! reduction. Systems of a page are independent and processed on a bounded
//! worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, info_span};

use crate::classifier::{Classifier, ClassifierAdapter};
use crate::cluster::GlyphClusterer;
use crate::factory::InterFactory;
use crate::linker::SymbolLinker;
use crate::model::{Glyph, GlyphId, Params, Shape};
use crate::sheet::SystemInfo;
use crate::sig::{InterId, Sig};
use crate::{Error, Result};

// ============================================================================
// Sample recording
// ============================================================================

/// Consumer of confirmed (glyph, shape) samples, typically feeding the
/// classifier training corpus.
pub trait SampleSink: Send {
    fn record(&mut self, glyph: &Glyph, shape: Shape, grade: f64);
}

// ============================================================================
// Per-system work unit
// ============================================================================

/// Everything one system needs: its layout, its sig (already holding the
/// structural inters) and its candidate glyphs.
#[derive(Debug)]
pub struct SystemJob {
    pub system: SystemInfo,
    pub sig: Sig,
    pub glyphs: Vec<Glyph>,
}

/// Counters reported per processed system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemStats {
    pub system: u32,
    pub compounds: usize,
    pub evaluations: usize,
    pub created: usize,
    pub removed: usize,
    pub alive: usize,
}

// ============================================================================
// SymbolEngine
// ============================================================================

pub struct SymbolEngine<C: Classifier> {
    adapter: ClassifierAdapter<C>,
    params: Params,
    sample_sink: Option<Arc<Mutex<dyn SampleSink>>>,
}

impl<C: Classifier> SymbolEngine<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            adapter: ClassifierAdapter::new(classifier),
            params: Params::default(),
            sample_sink: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_sample_sink(mut self, sink: Arc<Mutex<dyn SampleSink>>) -> Self {
        self.sample_sink = Some(sink);
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Process every system of a page on a bounded worker pool.
    ///
    /// `cancel` is polled between systems: once raised, unstarted systems
    /// are abandoned and the call reports `Error::Cancelled`.
    pub fn process_page(
        &self,
        jobs: &mut [SystemJob],
        cancel: &AtomicBool,
    ) -> Result<Vec<SystemStats>> {
        let threads = std::thread::available_parallelism().map_or(2, |n| n.get() + 1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("symbols-{i}"))
            .build()
            .map_err(|e| Error::Pool(e.to_string()))?;

        info!(systems = jobs.len(), threads, "symbols step started");
        let outcomes: Vec<Result<SystemStats>> = pool.install(|| {
            jobs.par_iter_mut()
                .map(|job| {
                    if cancel.load(Ordering::Relaxed) {
                        return Err(Error::Cancelled);
                    }
                    self.process_system(&mut job.system, &mut job.sig, &job.glyphs)
                })
                .collect()
        });
        outcomes.into_iter().collect()
    }

    /// Run the full interpretation sequence on one system.
    pub fn process_system(
        &self,
        system: &mut SystemInfo,
        sig: &mut Sig,
        glyphs: &[Glyph],
    ) -> Result<SystemStats> {
        let span = info_span!("system", id = system.id);
        let _enter = span.enter();

        let mut stats = SystemStats { system: system.id, ..SystemStats::default() };

        let compounds = GlyphClusterer::new(&self.params, &system.scale).clusters(glyphs);
        stats.compounds = compounds.len();

        let mut factory = InterFactory::new(&self.params, sig);
        // Inters created per compound, and per underlying glyph piece.
        let mut by_compound: Vec<Vec<InterId>> = Vec::with_capacity(compounds.len());
        let mut by_part: HashMap<GlyphId, Vec<InterId>> = HashMap::new();
        let mut glyph_registry: HashMap<GlyphId, Glyph> = HashMap::new();

        for compound in &compounds {
            let evals = self.adapter.evaluate(
                &compound.glyph,
                system,
                self.params.max_eval_count,
                self.params.min_eval_grade,
            );
            stats.evaluations += evals.len();

            let staff = system.closest_staff(compound.glyph.center()).map(|s| s.id);
            let mut created = Vec::new();
            for eval in evals {
                if let Some(id) = factory.create(sig, system, eval, &compound.glyph, staff) {
                    created.push(id);
                }
            }
            stats.created += created.len();
            if !created.is_empty() {
                glyph_registry.insert(compound.glyph.id, compound.glyph.clone());
                for &part in &compound.parts {
                    by_part.entry(part).or_default().extend(created.iter().copied());
                }
            }
            by_compound.push(created);
        }

        // Readings of one compound compete with each other.
        for created in &by_compound {
            cross_exclude(sig, created);
        }
        // So do readings of different compounds sharing a glyph piece.
        for created in by_part.values() {
            cross_exclude(sig, created);
        }

        factory.late_checks(sig, system);
        SymbolLinker::new(&self.params).process(sig, system, &mut factory.symbols);
        stats.removed = sig.reduce();

        stats.alive = sig.alive_count();
        self.record_samples(sig, &glyph_registry);

        debug!(
            compounds = stats.compounds,
            evaluations = stats.evaluations,
            removed = stats.removed,
            alive = stats.alive,
            "system interpreted"
        );
        Ok(stats)
    }

    /// Feed good glyph-backed inters to the sample sink, when one is set.
    fn record_samples(&self, sig: &Sig, registry: &HashMap<GlyphId, Glyph>) {
        let Some(sink) = &self.sample_sink else {
            return;
        };
        let mut sink = sink.lock();
        for id in sig.inters_where(|i| i.grade >= self.params.good_grade) {
            let inter = sig.inter(id);
            let (Some(glyph_id), Some(shape)) = (inter.glyph, inter.shape) else {
                continue;
            };
            if let Some(glyph) = registry.get(&glyph_id) {
                sink.record(glyph, shape, inter.grade);
            }
        }
    }
}

/// Pairwise exclusions among competing inters.
fn cross_exclude(sig: &mut Sig, ids: &[InterId]) {
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if a != b && sig.is_alive(a) && sig.is_alive(b) {
                sig.add_exclusion(a, b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Condition, Evaluation};
    use crate::model::{Rect, Scale};
    use crate::sheet::{MeasureStack, Staff, StaffId};

    /// Classifier stub answering from a fixed glyph-id table.
    struct Table(HashMap<GlyphId, Vec<Evaluation>>);

    impl Classifier for Table {
        fn evaluate(
            &self,
            glyph: &Glyph,
            _system: &SystemInfo,
            _max_results: usize,
            _min_grade: f64,
            _conditions: &[Condition],
        ) -> Vec<Evaluation> {
            self.0.get(&glyph.id).cloned().unwrap_or_default()
        }
    }

    fn system() -> SystemInfo {
        SystemInfo::new(0, Scale::new(20.0))
            .with_staff(Staff::new(StaffId(0), 0.0, 1000.0, 100.0))
            .with_stack(MeasureStack::new(0, 0.0, 1000.0))
    }

    #[test]
    fn competing_readings_reduce_to_best() {
        let mut table = HashMap::new();
        table.insert(
            GlyphId(1),
            vec![
                Evaluation { shape: Shape::GClef, grade: 0.9 },
                Evaluation { shape: Shape::DynamicF, grade: 0.4 },
            ],
        );
        let engine = SymbolEngine::new(Table(table));
        let mut system = system();
        let mut sig = Sig::new();
        let glyphs = vec![Glyph::new(GlyphId(1), Rect::new(20.0, 100.0, 14.0, 60.0), 200)];

        let stats = engine.process_system(&mut system, &mut sig, &glyphs).unwrap();
        assert_eq!(stats.alive, 1);
        assert_eq!(sig.inters_where(|i| i.kind == crate::sig::InterKind::Clef).len(), 1);
    }

    #[test]
    fn cancel_aborts_remaining_systems() {
        let engine = SymbolEngine::new(Table(HashMap::new()));
        let mut jobs: Vec<SystemJob> = (0..4)
            .map(|i| SystemJob {
                system: SystemInfo::new(i, Scale::new(20.0)),
                sig: Sig::new(),
                glyphs: Vec::new(),
            })
            .collect();
        let cancel = AtomicBool::new(true);

        let outcome = engine.process_page(&mut jobs, &cancel);
        assert!(matches!(outcome, Err(Error::Cancelled)));
    }

    #[test]
    fn sample_sink_sees_good_inters() {
        struct Memory(Vec<(GlyphId, Shape)>);
        impl SampleSink for Memory {
            fn record(&mut self, glyph: &Glyph, shape: Shape, _grade: f64) {
                self.0.push((glyph.id, shape));
            }
        }

        let mut table = HashMap::new();
        table.insert(GlyphId(1), vec![Evaluation { shape: Shape::GClef, grade: 0.9 }]);
        let sink = Arc::new(Mutex::new(Memory(Vec::new())));
        let engine = SymbolEngine::new(Table(table))
            .with_sample_sink(sink.clone() as Arc<Mutex<dyn SampleSink>>);

        let mut system = system();
        let mut sig = Sig::new();
        let glyphs = vec![Glyph::new(GlyphId(1), Rect::new(20.0, 100.0, 14.0, 60.0), 200)];
        engine.process_system(&mut system, &mut sig, &glyphs).unwrap();

        let recorded = &sink.lock().0;
        assert_eq!(recorded.as_slice(), &[(GlyphId(1), Shape::GClef)]);
    }
}
