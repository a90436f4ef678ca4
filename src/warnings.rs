use std::sync::atomic::{AtomicBool, Ordering};

use crate::store::Namespace;

static ENABLED: AtomicBool = AtomicBool::new(true);

pub(crate) enum RuntimeWarning<'a> {
    NotAMember(&'a str),
    SlowVisibility(Namespace, usize, f64, f64),
    LostResultRace(usize),
}

impl<'a> RuntimeWarning<'a> {
    pub(crate) fn enable_warnings() {
        ENABLED.store(true, Ordering::Relaxed);
    }
    pub(crate) fn disable_warnings() {
        ENABLED.store(false, Ordering::Relaxed);
    }
    fn print_warning(&self) -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    pub(crate) fn print(self) {
        #[cfg(not(feature = "disable-runtime-warnings"))]
        if self.print_warning() {
            match self {
                RuntimeWarning::NotAMember(node) => {
                    tracing::warn!("[DISTMM WARNING] node {node} is not part of its own membership view.
                    It will act as a worker, but no other node will account for it.
                    Check DISTMM_NODE_ID and DISTMM_MEMBERS.");
                }
                RuntimeWarning::SlowVisibility(namespace, key, waited, timeout) => {
                    if timeout > 0.0 {
                        tracing::warn!("[DISTMM WARNING] still waiting for {namespace}[{key}] after {waited:.1}s, the run fails with a not-ready error at {timeout:.1}s.
                        The visibility timeout can be set via the DISTMM_VISIBILITY_TIMEOUT environment variable.");
                    } else {
                        tracing::warn!("[DISTMM WARNING] still waiting for {namespace}[{key}] after {waited:.1}s and no visibility timeout is set, this wait may never end.
                        Set DISTMM_VISIBILITY_TIMEOUT to a positive number of seconds to bound it.");
                    }
                }
                RuntimeWarning::LostResultRace(ordinal) => {
                    tracing::warn!("[DISTMM WARNING] result for chunk {ordinal} was already recorded by another node, the local result was discarded.
                    This is harmless but means the chunk was computed twice.");
                }
            }
        }
    }
}

/// Turn runtime warnings on or off for the whole process.
pub fn set_runtime_warnings(enabled: bool) {
    if enabled {
        RuntimeWarning::enable_warnings();
    } else {
        RuntimeWarning::disable_warnings();
    }
}
