// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;

use log::{debug, warn};

use super::report::{pump_report, PumpRequest, ReportClass, ReportObject};
use super::sampler::SamplerError;

/// Configuration for the worker pool.
pub struct PoolConfig {
    /// Path to the path-length sampler binary.
    pub binary: PathBuf,
    /// The CPU cores to pin samplers to.  When absent, all cores but
    /// the last two are used, leaving headroom for the pool itself.
    pub cores: Option<Vec<usize>>,
}

impl PoolConfig {
    fn cores(&self) -> Vec<usize> {
        match &self.cores {
            Some(cores) => cores.clone(),
            None => (0..num_cpus::get().saturating_sub(2)).collect(),
        }
    }
}

/// Run a batch of pump jobs across one worker thread per core.
///
/// Each worker owns its sampler subprocess exclusively for the
/// lifetime of a job; workers coordinate only through the bounded job
/// queue and the mutex-protected core free-list.  A job that fails
/// (sampler unreachable, protocol violation) still produces a report,
/// carrying `UNKNOWN` and a failure reason, so results pair up with
/// jobs one-to-one.  No ordering is guaranteed across workers.
pub fn run_jobs(config: &PoolConfig, jobs: Vec<PumpRequest>) -> Vec<ReportObject> {
    let cores = config.cores();
    let workers = cores.len().max(1);
    let free_cores = Mutex::new(cores);
    let (job_sender, job_receiver) = crossbeam_channel::bounded::<PumpRequest>(workers);
    let (report_sender, report_receiver) = crossbeam_channel::unbounded();
    thread::scope(|scope| {
        for worker in 0..workers {
            let job_receiver = job_receiver.clone();
            let report_sender = report_sender.clone();
            let free_cores = &free_cores;
            let binary = &config.binary;
            scope.spawn(move || {
                debug!("spawning worker {}", worker);
                while let Ok(job) = job_receiver.recv() {
                    // Take a core for the duration of this job.
                    let core = free_cores.lock().unwrap().pop();
                    let report = match pump_report(binary, core, &job) {
                        Ok(report) => report,
                        Err(e) => {
                            warn!("pump failed: {}", e);
                            failed_report(&job, &e)
                        }
                    };
                    if let Some(core) = core {
                        free_cores.lock().unwrap().push(core);
                    }
                    if report_sender.send(report).is_err() {
                        break;
                    }
                }
            });
        }
        drop(report_sender);
        for job in jobs {
            if job_sender.send(job).is_err() {
                break;
            }
        }
        drop(job_sender);
        report_receiver.iter().collect()
    })
}

fn failed_report(job: &PumpRequest, error: &SamplerError) -> ReportObject {
    ReportObject {
        regexp: job.regexp.clone(),
        flags: job.flags.clone(),
        class: ReportClass::Unknown,
        poly_degree: None,
        prefix: None,
        pump: None,
        suffix: None,
        fail_reason: Some(error.to_string()),
    }
}
