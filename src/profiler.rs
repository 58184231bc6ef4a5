use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cumulative time and call count of one profiled section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionTiming {
    pub total: Duration,
    pub calls: u32,
}

/// Scoped profiler for the persistence and sampling paths.
#[derive(Debug, Default)]
pub struct Profiler {
    pub sections: HashMap<&'static str, SectionTiming>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        let section = self.sections.entry(name).or_default();
        section.total += elapsed;
        section.calls += 1;
    }

    pub fn finish(&mut self, guard: &ProfilerGuard) {
        self.record(guard.name, guard.start.elapsed());
    }

    /// Sections by descending total time.
    pub fn report_sorted(&self) -> Vec<(&'static str, SectionTiming)> {
        let mut v: Vec<_> = self.sections.iter().map(|(n, t)| (*n, *t)).collect();
        v.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(b.0)));
        v
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn log_and_clear(&mut self) {
        for (name, timing) in self.report_sorted() {
            log::info!("{:<28} {:>6} calls {:?}", name, timing.calls, timing.total);
        }
        self.clear();
    }
}

pub struct ProfilerGuard {
    name: &'static str,
    start: Instant,
}

/// Start a profiling section. The global profiler is updated when the guard
/// drops.
pub fn start(name: &'static str) -> ProfilerGuard {
    ProfilerGuard { name, start: Instant::now() }
}

#[cfg(feature = "profiling")]
impl Drop for ProfilerGuard {
    fn drop(&mut self) {
        crate::PROFILER.lock().finish(self);
    }
}

/// Profiles the enclosing scope when the `profiling` feature is enabled.
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        #[cfg(feature = "profiling")]
        let _guard = $crate::profiler::start($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_accumulate_and_sort() {
        let mut p = Profiler::new();
        p.record("load_container", Duration::from_millis(5));
        p.record("write_value_items_xml", Duration::from_millis(2));
        p.record("load_container", Duration::from_millis(1));
        let report = p.report_sorted();
        assert_eq!(report[0].0, "load_container");
        assert_eq!(report[0].1, SectionTiming { total: Duration::from_millis(6), calls: 2 });
        assert_eq!(report[1].1.calls, 1);
        p.log_and_clear();
        assert!(p.sections.is_empty());
    }
}
