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
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Serialize, Serializer};

use super::classifier::Classification;
use super::pumper::{pump_full_report, ProfileStatus, PumpOutcome, PumpProfile};
use super::sampler::{PathLengthSampler, SamplerError};

/// A profile whose ladder was cut short with fewer points than this
/// is treated as evidence of exponential growth in its own right.
const SHORT_PROFILE_POINTS: usize = 5;

/// The user-visible growth label.  Unlike [`Classification`] this
/// also covers the two timeout-derived verdicts, where the evidence
/// is "the sampler could not keep up" rather than a fitted curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportClass {
    Linear,
    Polynomial,
    Exponential,
    /// Even the unpumped witness timed out.
    ExponentialBaselineFail,
    /// A pump site timed out before enough points were gathered.
    ExponentialPumpTimeout,
    Unknown,
}

impl fmt::Display for ReportClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            ReportClass::Linear => "LINEAR",
            ReportClass::Polynomial => "POLYNOMIAL",
            ReportClass::Exponential => "EXPONENTIAL",
            ReportClass::ExponentialBaselineFail => "EXPONENTIAL(baseline_fail)",
            ReportClass::ExponentialPumpTimeout => "EXPONENTIAL(pump_timeout)",
            ReportClass::Unknown => "UNKNOWN",
        };
        write!(f, "{}", label)
    }
}

impl Serialize for ReportClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&Classification> for ReportClass {
    fn from(class: &Classification) -> Self {
        match class {
            Classification::Linear { .. } => ReportClass::Linear,
            Classification::Polynomial { .. } => ReportClass::Polynomial,
            Classification::Exponential { .. } => ReportClass::Exponential,
            Classification::Unknown => ReportClass::Unknown,
        }
    }
}

// ============================================================================
// Report Object
// ============================================================================

/// The final verdict for one witness.  When a winning pump site
/// exists, `prefix`/`pump`/`suffix` slice the witness around it, so a
/// consumer can reproduce the slowdown by repeating `pump` in place.
/// Byte-string fields serialize base64-encoded.
#[derive(Debug, Serialize)]
pub struct ReportObject {
    #[serde(serialize_with = "serialize_base64")]
    pub regexp: Vec<u8>,
    pub flags: String,
    pub class: ReportClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poly_degree: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_base64_opt"
    )]
    pub prefix: Option<Vec<u8>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_base64_opt"
    )]
    pub pump: Option<Vec<u8>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_base64_opt"
    )]
    pub suffix: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

fn serialize_base64_opt<S: Serializer>(
    bytes: &Option<Vec<u8>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    // Only reachable when the option is populated, since absent
    // fields are skipped.
    serialize_base64(bytes.as_deref().unwrap_or(&[]), serializer)
}

// ============================================================================
// Cross-profile aggregation
// ============================================================================

/// Post-process a pump outcome into the final report.
///
/// Timeout evidence trumps fitted curves: a site that timed out at
/// scanning depth, or whose ladder was cut short early, is labelled
/// exponential outright.  Otherwise the best fully profiled
/// polynomial site wins, with ties broken by degree and then by
/// leading coefficient.  An exponential fit never reaches this
/// selection since it would already have ended the search early.
pub fn build_report(
    regexp: &[u8],
    flags: &str,
    witness: &[u8],
    width: usize,
    outcome: &PumpOutcome,
) -> ReportObject {
    let mut report = ReportObject {
        regexp: regexp.to_vec(),
        flags: flags.to_string(),
        class: ReportClass::Unknown,
        poly_degree: None,
        prefix: None,
        pump: None,
        suffix: None,
        fail_reason: None,
    };
    let mut winner: Option<(usize, usize)> = None;
    match outcome {
        PumpOutcome::BaselineTimeout => {
            report.class = ReportClass::ExponentialBaselineFail;
        }
        PumpOutcome::FastBreak { class, profiles } => {
            let profile = profiles.last().expect("fastbreak with no profile");
            report.class = ReportClass::from(class);
            if let Classification::Polynomial { degree, .. } = class {
                report.poly_degree = Some(*degree);
            }
            winner = Some((profile.pump_pos, profile.pump_len));
        }
        PumpOutcome::PartialTimeout { profiles } | PumpOutcome::Done { profiles } => {
            if let Some(profile) = profiles
                .iter()
                .find(|p| p.status == ProfileStatus::BasePumpTimeout)
            {
                report.class = ReportClass::ExponentialPumpTimeout;
                winner = Some((profile.pump_pos, profile.pump_len));
            } else if let Some(profile) = profiles.iter().find(|p| {
                p.status == ProfileStatus::PumpTimeout && p.points.len() < SHORT_PROFILE_POINTS
            }) {
                report.class = ReportClass::ExponentialPumpTimeout;
                winner = Some((profile.pump_pos, profile.pump_len));
            } else if let Some((profile, degree)) = best_polynomial(profiles) {
                report.class = ReportClass::Polynomial;
                report.poly_degree = Some(degree);
                winner = Some((profile.pump_pos, profile.pump_len));
            }
        }
    }
    // Slice the witness at the winning site.  The two
    // no-usable-site verdicts carry no slices.
    if let Some((pump_pos, pump_len)) = winner {
        if report.class != ReportClass::Unknown {
            report.prefix = Some(witness[..pump_pos * width].to_vec());
            report.pump = Some(witness[pump_pos * width..(pump_pos + pump_len) * width].to_vec());
            report.suffix = Some(witness[(pump_pos + pump_len) * width..].to_vec());
        }
    }
    report
}

/// Select the strongest fully profiled polynomial site: highest
/// degree first, largest leading coefficient second.
fn best_polynomial(profiles: &[PumpProfile]) -> Option<(&PumpProfile, u32)> {
    let mut best: Option<(&PumpProfile, u32, f64)> = None;
    for profile in profiles {
        if profile.status != ProfileStatus::Full {
            continue;
        }
        let Classification::Polynomial {
            degree,
            leading_coefficient,
            ..
        } = profile.class
        else {
            continue;
        };
        let replace = match best {
            None => true,
            Some((_, best_degree, best_leading)) => {
                degree > best_degree || (degree == best_degree && leading_coefficient > best_leading)
            }
        };
        if replace {
            best = Some((profile, degree, leading_coefficient));
        }
    }
    best.map(|(profile, degree, _)| (profile, degree))
}

// ============================================================================
// End-to-end entry point
// ============================================================================

/// One witness to pump, together with its regexp and time budget.
#[derive(Clone, Debug)]
pub struct PumpRequest {
    pub regexp: Vec<u8>,
    pub flags: String,
    pub witness: Vec<u8>,
    pub width: usize,
    pub budget: Duration,
}

/// Pump one witness end-to-end against the path-length sampler and
/// aggregate the outcome into a report.  The sampler subprocess is
/// torn down on every exit path, including errors.
pub fn pump_report(
    binary: &Path,
    core: Option<usize>,
    request: &PumpRequest,
) -> Result<ReportObject, SamplerError> {
    let mut sampler = PathLengthSampler::new(
        binary.to_path_buf(),
        request.regexp.clone(),
        request.flags.clone(),
        request.width as u8,
        core,
    );
    // Leave a second to spare for teardown.
    let deadline = Instant::now() + request.budget.saturating_sub(Duration::from_secs(1));
    let outcome = pump_full_report(&mut sampler, &request.witness, request.width, deadline)?;
    Ok(build_report(
        &request.regexp,
        &request.flags,
        &request.witness,
        request.width,
        &outcome,
    ))
}
