/*!
 * OOM Source Selection
 */

use super::cgroupfs::CgroupFsOomSource;
use super::monitor::OomMonitor;
use super::simulation::SimulationOomSource;
use super::traits::*;
use super::types::*;
use crate::resources::GroupHandle;
use std::time::Duration;

/// OOM source chosen at construction
#[derive(Clone)]
pub enum OomSource {
    CgroupFs(CgroupFsOomSource),
    Simulation(SimulationOomSource),
}

impl OomSource {
    pub fn cgroupfs(poll_interval: Duration) -> Self {
        OomSource::CgroupFs(CgroupFsOomSource::new(poll_interval))
    }

    pub fn simulation(source: SimulationOomSource) -> Self {
        OomSource::Simulation(source)
    }

    fn as_source(&self) -> &dyn OomEventSource {
        match self {
            OomSource::CgroupFs(s) => s,
            OomSource::Simulation(s) => s,
        }
    }
}

impl OomEventSource for OomSource {
    fn open(&self, target: &GroupHandle) -> OomResult<OomMonitor> {
        self.as_source().open(target)
    }

    fn platform(&self) -> OomPlatform {
        self.as_source().platform()
    }
}
