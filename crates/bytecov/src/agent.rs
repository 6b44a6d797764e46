//! Load-hook facade.
//!
//! # Example
//!
//! ```no_run
//! use bytecov::agent::{CoverageAgent, PrefixFilter};
//! use bytecov::config::InstrumentConfig;
//! use bytecov::coverage::CounterStore;
//! use std::sync::Arc;
//!
//! let agent = CoverageAgent::new(
//!     InstrumentConfig::default(),
//!     PrefixFilter::new(["com/acme/"]),
//!     Arc::clone(CounterStore::global()),
//! );
//! # let original: Vec<u8> = Vec::new();
//! let bytes = agent.transform("com/acme/Widget", &original).unwrap_or(original);
//! // ... the program runs, probes call CounterStore::hit ...
//! let report = agent.drain();
//! println!("{:.1}% of lines reached", report.coverage_percent());
//! ```

use crate::classfile::{self, ClassModel};
use crate::config::InstrumentConfig;
use crate::coverage::{
    aggregate, inject, ClassIdentity, ClassPlan, CounterStore, CoverageReport, Diagnostic, DiagnosticLog,
    MetadataRegistry, MethodStatus, SegmentId,
};
use crate::result::BytecovResult;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Decides which classes are instrumented
pub trait ClassFilter: Send + Sync {
    /// `class_name` is the internal name, e.g. `com/acme/Widget`
    fn is_eligible(&self, class_name: &str) -> bool;
}

impl<F> ClassFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_eligible(&self, class_name: &str) -> bool {
        self(class_name)
    }
}

/// Accepts classes whose name starts with one of the prefixes.
///
/// Prefixes may use `.` or `/` as the package separator. The empty prefix
/// accepts every class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixFilter {
    prefixes: Vec<String>,
}

impl PrefixFilter {
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().replace('.', "/"))
                .collect(),
        }
    }

    /// Filter accepting every class
    #[must_use]
    pub fn all() -> Self {
        Self::new([""])
    }

    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl ClassFilter for PrefixFilter {
    fn is_eligible(&self, class_name: &str) -> bool {
        self.prefixes.iter().any(|p| class_name.starts_with(p.as_str()))
    }
}

/// Entry point a host loader calls for every class it defines
pub struct CoverageAgent {
    config: InstrumentConfig,
    filter: Box<dyn ClassFilter>,
    store: Arc<CounterStore>,
    registry: MetadataRegistry,
    diagnostics: Mutex<DiagnosticLog>,
    drained: AtomicBool,
}

impl std::fmt::Debug for CoverageAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageAgent")
            .field("config", &self.config)
            .field("classes", &self.registry.len())
            .field("segments", &self.store.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl CoverageAgent {
    #[must_use]
    pub fn new(config: InstrumentConfig, filter: impl ClassFilter + 'static, store: Arc<CounterStore>) -> Self {
        Self {
            config,
            filter: Box::new(filter),
            store,
            registry: MetadataRegistry::new(),
            diagnostics: Mutex::new(DiagnosticLog::new()),
            drained: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CounterStore> {
        &self.store
    }

    #[must_use]
    pub const fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    fn record(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(diagnostic);
    }

    /// Instrument `bytes` for the host.
    ///
    /// `None` means the host should define the class from its original
    /// bytes: the class is filtered out, has nothing to probe, or could not
    /// be instrumented (a diagnostic is recorded). Never panics.
    pub fn transform(&self, class_name: &str, bytes: &[u8]) -> Option<Vec<u8>> {
        if !self.filter.is_eligible(class_name) {
            return None;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_transform(class_name, bytes))) {
            Ok(Ok(out)) => out,
            Ok(Err(err)) => {
                self.record(Diagnostic::skip_class(class_name, &err));
                None
            }
            Err(payload) => {
                self.record(Diagnostic::aborted(
                    class_name,
                    format!("instrumentation panicked: {}", panic_message(payload.as_ref())),
                ));
                None
            }
        }
    }

    /// Instrument `bytes` regardless of the filter, returning the failure
    /// instead of recording it.
    ///
    /// Classes that already call the configured bridge are left alone with a
    /// warning, so feeding instrumented output back in never counts twice.
    pub fn try_transform(&self, class_name: &str, bytes: &[u8]) -> BytecovResult<Option<Vec<u8>>> {
        let class = classfile::decode(bytes)?;
        if class.name != class_name {
            self.record(Diagnostic::warn(
                class_name,
                format!("class bytes declare {}", class.name),
            ));
        }
        let bridge = &self.config.bridge;
        if class
            .constant_pool
            .find_method_ref(&bridge.owner, &bridge.name, &bridge.descriptor)
            .is_some()
        {
            self.record(Diagnostic::warn(
                class.name.as_str(),
                format!("already calls {}.{}, left unchanged", bridge.owner, bridge.name),
            ));
            return Ok(None);
        }
        let identity = ClassIdentity::of(class.name.as_str(), bytes);
        let plan = inject::plan(&class, &self.config)?;
        for method in &plan.methods {
            if let MethodStatus::Failed { kind, reason } = &method.status {
                self.record(Diagnostic::skip_method(
                    class.name.as_str(),
                    format!("{}{}", method.name, method.descriptor),
                    *kind,
                    reason.as_str(),
                ));
            }
        }

        if plan.is_empty() {
            tracing::debug!(class = %identity, "no probes, class left unmodified");
            self.registry.insert(plan.metadata(identity));
            return Ok(None);
        }

        let (segment, out) = self.emit(&identity, &class, &plan)?;
        tracing::debug!(
            class = %identity,
            segment = %segment,
            probes = plan.probe_count(),
            methods = plan.planned.len(),
            "instrumented class"
        );
        self.registry.insert(plan.metadata(identity));
        Ok(Some(out))
    }

    /// Rewritten bytes of `class` with probes reporting to `segment`
    fn render(&self, class: &ClassModel, plan: &ClassPlan, segment: SegmentId) -> BytecovResult<Vec<u8>> {
        let mut class = class.clone();
        inject::apply(&mut class, plan, segment)?;
        let out = classfile::encode(&class)?;
        if self.config.self_check {
            classfile::self_check(&out)?;
        }
        Ok(out)
    }

    /// Render against the id the next segment would get, then allocate.
    ///
    /// A class whose rewrite fails never claims a segment. Probe layout does not depend on the segment id, so when
    /// another thread took that id (or the class was seen before) the second
    /// render only swaps the constant.
    fn emit(
        &self,
        identity: &ClassIdentity,
        class: &ClassModel,
        plan: &ClassPlan,
    ) -> BytecovResult<(SegmentId, Vec<u8>)> {
        let provisional = SegmentId::new(u32::try_from(self.store.len()).unwrap_or(u32::MAX));
        let out = self.render(class, plan, provisional)?;
        let segment = self.store.allocate(identity, plan.probe_count())?.id();
        if segment == provisional {
            return Ok((segment, out));
        }
        Ok((segment, self.render(class, plan, segment)?))
    }

    /// Coverage so far; the program may keep running
    #[must_use]
    pub fn snapshot(&self) -> CoverageReport {
        aggregate(&self.registry.records(), &self.store.snapshot())
    }

    /// Final report at shutdown. Meant to run once; later calls warn and
    /// still return a fresh report.
    #[must_use]
    pub fn drain(&self) -> CoverageReport {
        if self.drained.swap(true, Ordering::AcqRel) {
            tracing::warn!("coverage drained more than once");
        }
        let report = self.snapshot();
        tracing::debug!(
            classes = report.summary.classes,
            executed = report.summary.executed_classes,
            percent = report.summary.coverage_percent,
            "coverage drained"
        );
        report
    }

    /// Copy of the diagnostics recorded so far
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticLog {
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Zero every counter and forget diagnostics; instrumented classes keep
    /// their metadata
    pub fn reset(&self) {
        self.store.reset();
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
