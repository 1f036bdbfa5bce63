use std::time::{Duration, Instant};

use redoscope::pump::{
    build_report, pump, pump_full_report, pump_ladder, Classification, ProfileStatus,
    PumpOutcome, PumpProfile, ReportClass, Sample, Sampler, SamplerError,
};

/// A synthetic sampler backed by a plain function: deterministic,
/// instantaneous, and in-process.
struct FnSampler<F: FnMut(&[u8]) -> Sample>(F);

impl<F: FnMut(&[u8]) -> Sample> Sampler for FnSampler<F> {
    fn sample(&mut self, subject: &[u8]) -> Result<Sample, SamplerError> {
        Ok((self.0)(subject))
    }
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(3600)
}

#[test]
fn test_pump_01() {
    // Slice arithmetic is in characters.
    let pumped = pump(b"abcdef", 1, 2, 1, 3);
    assert_eq!(pumped, b"abcbcbcdef");
}

#[test]
fn test_pump_02() {
    // With two-byte characters the byte indices scale.
    let witness = b"a\0b\0c\0";
    let pumped = pump(witness, 1, 1, 2, 2);
    assert_eq!(pumped, b"a\0b\0b\0c\0");
}

#[test]
fn test_pump_03() {
    // Pumping zero times deletes the slice.
    assert_eq!(pump(b"abcdef", 1, 2, 1, 0), b"adef");
}

#[test]
fn test_pump_04() {
    // Pumping is idempotent: the same site and count always yield the
    // same subject, and a deterministic sampler the same cost.
    let a = pump(b"aabbcc", 2, 3, 1, 100);
    let b = pump(b"aabbcc", 2, 3, 1, 100);
    assert_eq!(a, b);
    let mut sampler = FnSampler(|s: &[u8]| Sample::Cost(s.len() as f64 * 3.0));
    let first = sampler.sample(&a).unwrap();
    let second = sampler.sample(&b).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_ladder_01() {
    // Twenty rungs, ascending from 10 to 256, all distinct.
    let ladder = pump_ladder();
    assert_eq!(ladder.len(), 20);
    assert_eq!(ladder[0], 10);
    assert_eq!(*ladder.last().unwrap(), 256);
    assert!(ladder.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_full_report_01() {
    // A quadratic cost function trips the fast break on the very
    // first site, classified as a polynomial of degree two.
    let mut sampler = FnSampler(|s: &[u8]| Sample::Cost((s.len() as f64).powi(2)));
    let outcome = pump_full_report(&mut sampler, b"aabbcc", 1, far_deadline()).unwrap();
    let PumpOutcome::FastBreak { class, profiles } = &outcome else {
        panic!("expected fast break, got {:?}", outcome);
    };
    match class {
        Classification::Polynomial {
            degree,
            should_break,
            ..
        } => {
            assert_eq!(*degree, 2);
            assert!(should_break);
        }
        other => panic!("expected polynomial, got {:?}", other),
    }
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].status, ProfileStatus::Full);
    assert_eq!(profiles[0].points.len(), pump_ladder().len());
}

#[test]
fn test_full_report_02() {
    // A timed-out baseline ends the whole run.
    let mut sampler = FnSampler(|_: &[u8]| Sample::TimedOut);
    let outcome = pump_full_report(&mut sampler, b"aabbcc", 1, far_deadline()).unwrap();
    assert!(matches!(outcome, PumpOutcome::BaselineTimeout));
}

#[test]
fn test_full_report_03() {
    // Sites which time out at scanning depth are recorded and
    // skipped; with every site timing out the search still completes.
    let witness = b"aabbcc";
    let mut sampler = FnSampler(|s: &[u8]| {
        if s.len() == witness.len() {
            Sample::Cost(100.0)
        } else {
            Sample::TimedOut
        }
    });
    let outcome = pump_full_report(&mut sampler, witness, 1, far_deadline()).unwrap();
    let PumpOutcome::Done { profiles } = &outcome else {
        panic!("expected completion, got {:?}", outcome);
    };
    // One site per (pump_len, pump_pos) pair.
    let chars = witness.len();
    let sites: usize = (1..chars).map(|len| chars - len).sum();
    assert_eq!(profiles.len(), sites);
    assert!(profiles
        .iter()
        .all(|p| p.status == ProfileStatus::BasePumpTimeout));
}

#[test]
fn test_full_report_04() {
    // An expired deadline reports partial results immediately.
    let mut sampler = FnSampler(|s: &[u8]| Sample::Cost(s.len() as f64));
    let deadline = Instant::now() - Duration::from_secs(1);
    let outcome = pump_full_report(&mut sampler, b"aabbcc", 1, deadline).unwrap();
    let PumpOutcome::PartialTimeout { profiles } = &outcome else {
        panic!("expected partial timeout, got {:?}", outcome);
    };
    assert!(profiles.is_empty());
}

#[test]
fn test_full_report_05() {
    // Linear cost never breaks early and yields no polynomial site.
    let mut sampler = FnSampler(|s: &[u8]| Sample::Cost(s.len() as f64 * 5.0));
    let witness = b"aabb";
    let outcome = pump_full_report(&mut sampler, witness, 1, far_deadline()).unwrap();
    assert!(matches!(outcome, PumpOutcome::Done { .. }));
    let report = build_report(b"(a+)+", "", witness, 1, &outcome);
    assert_eq!(report.class, ReportClass::Unknown);
    assert!(report.pump.is_none());
}

#[test]
fn test_full_report_06() {
    // Deterministic site ordering: pump length ascends, position
    // descends within it.
    let mut seen = Vec::new();
    let witness = b"abcd";
    {
        let mut sampler = FnSampler(|s: &[u8]| {
            seen.push(s.len());
            Sample::Cost(1.0)
        });
        pump_full_report(&mut sampler, witness, 1, far_deadline()).unwrap();
    }
    // Baseline first, then three sites of length one, then two of
    // length two, then one of length three -- each sampled at depth
    // 100, so the pumped lengths identify the pump length.
    assert_eq!(seen, vec![4, 103, 103, 103, 202, 202, 301]);
}

#[test]
fn test_report_01() {
    // The quadratic end-to-end: report class POLYNOMIAL of degree
    // two, with the witness sliced around the winning site.
    let witness = b"aabbcc";
    let mut sampler = FnSampler(|s: &[u8]| Sample::Cost((s.len() as f64).powi(2)));
    let outcome = pump_full_report(&mut sampler, witness, 1, far_deadline()).unwrap();
    let report = build_report(b"(a|a)+$", "", witness, 1, &outcome);
    assert_eq!(report.class, ReportClass::Polynomial);
    assert_eq!(report.poly_degree, Some(2));
    let prefix = report.prefix.unwrap();
    let pump_slice = report.pump.unwrap();
    let suffix = report.suffix.unwrap();
    let mut rebuilt = prefix.clone();
    rebuilt.extend(&pump_slice);
    rebuilt.extend(&suffix);
    assert_eq!(rebuilt, witness);
    assert!(!pump_slice.is_empty());
}

#[test]
fn test_report_02() {
    let report = build_report(b"a", "", b"aa", 1, &PumpOutcome::BaselineTimeout);
    assert_eq!(report.class, ReportClass::ExponentialBaselineFail);
    assert!(report.prefix.is_none());
    assert_eq!(format!("{}", report.class), "EXPONENTIAL(baseline_fail)");
}

#[test]
fn test_report_03() {
    // Any scan-depth timeout dominates the aggregate verdict.
    let witness = b"aabbcc";
    let mut sampler = FnSampler(|s: &[u8]| {
        if s.len() == witness.len() {
            Sample::Cost(100.0)
        } else {
            Sample::TimedOut
        }
    });
    let outcome = pump_full_report(&mut sampler, witness, 1, far_deadline()).unwrap();
    let report = build_report(b"a", "", witness, 1, &outcome);
    assert_eq!(report.class, ReportClass::ExponentialPumpTimeout);
    assert!(report.pump.is_some());
}

#[test]
fn test_report_04() {
    // Polynomial selection: higher degree wins, then larger leading
    // coefficient.
    let profile = |pos, degree, leading| PumpProfile {
        status: ProfileStatus::Full,
        pump_pos: pos,
        pump_len: 1,
        points: vec![(10, 1.0), (20, 2.0), (30, 3.0), (40, 4.0)],
        class: Classification::Polynomial {
            r_squared: 0.99,
            degree,
            leading_coefficient: leading,
            should_break: false,
        },
    };
    let outcome = PumpOutcome::Done {
        profiles: vec![profile(0, 2, 9.0), profile(1, 3, 0.5), profile(2, 3, 0.7)],
    };
    let report = build_report(b"a", "", b"abcdef", 1, &outcome);
    assert_eq!(report.class, ReportClass::Polynomial);
    assert_eq!(report.poly_degree, Some(3));
    // Winner is the degree-3 profile with the larger coefficient.
    assert_eq!(report.pump.unwrap(), b"c");
}

#[test]
fn test_report_05() {
    // A cut-short ladder with too few points reads as exponential.
    let outcome = PumpOutcome::Done {
        profiles: vec![PumpProfile {
            status: ProfileStatus::PumpTimeout,
            pump_pos: 1,
            pump_len: 2,
            points: vec![(10, 1.0), (20, 100.0)],
            class: Classification::Unknown,
        }],
    };
    let report = build_report(b"a", "", b"abcdef", 1, &outcome);
    assert_eq!(report.class, ReportClass::ExponentialPumpTimeout);
    assert_eq!(report.pump.unwrap(), b"bc");
}

#[test]
fn test_report_06() {
    // Reports serialize with byte fields base64-encoded and absent
    // fields omitted.
    let report = build_report(b"a+", "i", b"aa", 1, &PumpOutcome::BaselineTimeout);
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"class\":\"EXPONENTIAL(baseline_fail)\""));
    assert!(json.contains("\"regexp\":\"YSs=\""));
    assert!(json.contains("\"flags\":\"i\""));
    assert!(!json.contains("prefix"));
}
