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
use std::collections::VecDeque;
use std::time::Instant;

use log::{debug, info};

use super::classifier::{classify, Classification};
use super::sampler::{Sample, Sampler, SamplerError};

/// Number of pump repetitions used while scanning for interesting
/// sites.  Deep profiling then varies the repetition count along
/// [`pump_ladder`].
pub const PUMP_DEPTH: usize = 100;

/// The repetition counts sampled when profiling one site: twenty
/// evenly spaced rungs between 10 and 256, rounded to integers.
pub fn pump_ladder() -> Vec<usize> {
    let mut rungs: Vec<usize> = (0..20)
        .map(|i| (10.0 + (256.0 - 10.0) * i as f64 / 19.0).round() as usize)
        .collect();
    rungs.dedup();
    rungs
}

/// The shorter ladder retried when the main one times out: with these
/// counts even a badly super-linear site usually answers.
const FALLBACK_LADDER: [usize; 4] = [1, 2, 3, 4];

/// Construct a pumped subject by repeating the slice of `witness` at
/// character position `pump_pos` (of character length `pump_len`)
/// `times` times.  Slice arithmetic is in characters, so byte indices
/// scale by `width`.
pub fn pump(witness: &[u8], pump_pos: usize, pump_len: usize, width: usize, times: usize) -> Vec<u8> {
    assert!(pump_len <= witness.len() / width);
    let before = &witness[..pump_pos * width];
    let slice = &witness[pump_pos * width..(pump_pos + pump_len) * width];
    let after = &witness[(pump_pos + pump_len) * width..];
    let mut pumped = Vec::with_capacity(before.len() + slice.len() * times + after.len());
    pumped.extend_from_slice(before);
    for _ in 0..times {
        pumped.extend_from_slice(slice);
    }
    pumped.extend_from_slice(after);
    pumped
}

// ============================================================================
// Profiles
// ============================================================================

/// How a site's profiling run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileStatus {
    /// Every rung of the ladder answered.
    Full,
    /// A timeout (or the deadline) cut the ladder short.
    PumpTimeout,
    /// The site timed out already at the scanning depth, before any
    /// ladder was attempted.
    BasePumpTimeout,
}

/// The measurements collected for one `(pump_pos, pump_len)` site,
/// along with their classification.  Points are `(subject byte
/// length, cost)` pairs and are append-only.
#[derive(Clone, Debug)]
pub struct PumpProfile {
    pub status: ProfileStatus,
    pub pump_pos: usize,
    pub pump_len: usize,
    pub points: Vec<(usize, f64)>,
    pub class: Classification,
}

/// The overall outcome of pumping one witness.
#[derive(Debug)]
pub enum PumpOutcome {
    /// Even the unpumped witness timed out.  The hypothesis recorded
    /// downstream is that the seed input is already catastrophic.
    BaselineTimeout,
    /// A site classified as exponential (or a polynomial past the
    /// break threshold) ended the search early.
    FastBreak {
        class: Classification,
        profiles: Vec<PumpProfile>,
    },
    /// The wall-clock deadline arrived mid-search; whatever was
    /// gathered so far is reported.
    PartialTimeout { profiles: Vec<PumpProfile> },
    /// The exhaustive search ran to completion.
    Done { profiles: Vec<PumpProfile> },
}

impl PumpOutcome {
    pub fn profiles(&self) -> &[PumpProfile] {
        match self {
            PumpOutcome::BaselineTimeout => &[],
            PumpOutcome::FastBreak { profiles, .. }
            | PumpOutcome::PartialTimeout { profiles }
            | PumpOutcome::Done { profiles } => profiles,
        }
    }
}

// ============================================================================
// Site profiling
// ============================================================================

/// Sample one site along the pump ladder.  A timeout mid-ladder
/// switches to the fallback rungs once; a second timeout (or the
/// deadline) ends the run with whatever points were gathered.
fn report_pump<S: Sampler>(
    sampler: &mut S,
    witness: &[u8],
    width: usize,
    pump_pos: usize,
    pump_len: usize,
    deadline: Instant,
) -> Result<(ProfileStatus, Vec<(usize, f64)>), SamplerError> {
    let mut ladder: VecDeque<usize> = pump_ladder().into();
    let mut points = Vec::new();
    while let Some(times) = ladder.pop_front() {
        if Instant::now() > deadline {
            return Ok((ProfileStatus::PumpTimeout, points));
        }
        let pumped = pump(witness, pump_pos, pump_len, width, times);
        match sampler.sample(&pumped)? {
            Sample::Cost(cost) => {
                points.push((pumped.len(), cost));
            }
            Sample::TimedOut => {
                debug!("timeout at {} pumps", times);
                if FALLBACK_LADDER.contains(&times) {
                    // Even the fallback rungs are too slow.
                    return Ok((ProfileStatus::PumpTimeout, points));
                }
                let keep = ladder.len().min(FALLBACK_LADDER.len());
                ladder = FALLBACK_LADDER[..keep].iter().copied().collect();
            }
        }
    }
    Ok((ProfileStatus::Full, points))
}

// ============================================================================
// Exhaustive search
// ============================================================================

/// Pump every `(pump_pos, pump_len)` site of the witness and profile
/// the promising ones.
///
/// The scan samples each site at [`PUMP_DEPTH`] repetitions and
/// computes its _slowdown per character_ against the unpumped
/// baseline; only sites that beat the best slowdown seen so far are
/// profiled in depth and classified.  A site classified as
/// exponential, or as a polynomial whose horizon prediction crossed
/// the break threshold, ends the search immediately
/// ([`PumpOutcome::FastBreak`]).  Site ordering is deterministic:
/// pump length ascends while pump position descends.
pub fn pump_full_report<S: Sampler>(
    sampler: &mut S,
    witness: &[u8],
    width: usize,
    deadline: Instant,
) -> Result<PumpOutcome, SamplerError> {
    debug!("establishing baseline");
    let baseline = match sampler.sample(witness)? {
        Sample::Cost(cost) => cost,
        Sample::TimedOut => {
            return Ok(PumpOutcome::BaselineTimeout);
        }
    };
    debug!("baseline is {}", baseline);
    let chars = witness.len() / width;
    let mut profiles = Vec::new();
    let mut slowest_per_char = 0.0f64;
    for pump_len in 1..chars {
        debug!("pumping substrings of length {}", pump_len);
        for pump_pos in (0..chars - pump_len).rev() {
            if Instant::now() > deadline {
                info!("deadline reached, reporting partial results");
                return Ok(PumpOutcome::PartialTimeout { profiles });
            }
            let pumped = pump(witness, pump_pos, pump_len, width, PUMP_DEPTH);
            let cost = match sampler.sample(&pumped)? {
                Sample::Cost(cost) => cost,
                Sample::TimedOut => {
                    // Timeout at scanning depth: report this guy and
                    // move on.
                    profiles.push(PumpProfile {
                        status: ProfileStatus::BasePumpTimeout,
                        pump_pos,
                        pump_len,
                        points: Vec::new(),
                        class: Classification::Unknown,
                    });
                    continue;
                }
            };
            let slowdown_per_char = (cost - baseline) / pump_len as f64;
            if slowdown_per_char <= slowest_per_char {
                continue;
            }
            slowest_per_char = slowdown_per_char;
            let (status, points) =
                report_pump(sampler, witness, width, pump_pos, pump_len, deadline)?;
            let xs: Vec<f64> = points.iter().map(|(x, _)| *x as f64).collect();
            let ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
            let class = classify(&xs, &ys);
            debug!("site ({}, {}) classed as {:?}", pump_pos, pump_len, class);
            let fastbreak = class.is_fastbreak();
            profiles.push(PumpProfile {
                status,
                pump_pos,
                pump_len,
                points,
                class,
            });
            if fastbreak {
                debug!("breaking early");
                return Ok(PumpOutcome::FastBreak { class, profiles });
            }
        }
    }
    info!("finished pumping exhaustively");
    Ok(PumpOutcome::Done { profiles })
}
