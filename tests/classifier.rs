use redoscope::pump::{classify, Classification};

#[test]
fn test_classify_01() {
    // A perfectly linear series wins outright, with a vanishing
    // p-value.
    let xs = [10.0, 50.0, 100.0, 200.0];
    let ys = [10.0, 50.0, 100.0, 200.0];
    match classify(&xs, &ys) {
        Classification::Linear { p_value } => assert!(p_value <= 1e-4),
        other => panic!("expected linear, got {:?}", other),
    }
}

#[test]
fn test_classify_02() {
    // A quadratic series: degree two, unit leading coefficient.
    let xs = [10.0, 20.0, 30.0, 40.0, 50.0];
    let ys = [100.0, 400.0, 900.0, 1600.0, 2500.0];
    match classify(&xs, &ys) {
        Classification::Polynomial {
            r_squared,
            degree,
            leading_coefficient,
            should_break,
        } => {
            assert!(r_squared >= 0.99);
            assert_eq!(degree, 2);
            assert!((leading_coefficient - 1.0).abs() < 0.1);
            // The fit predicts 10^10 steps at 100k characters.
            assert!(should_break);
        }
        other => panic!("expected polynomial, got {:?}", other),
    }
}

#[test]
fn test_classify_03() {
    // A cubic series.
    let xs = [10.0, 20.0, 30.0, 40.0, 50.0];
    let ys: Vec<f64> = xs.iter().map(|x| x * x * x).collect();
    match classify(&xs, &ys) {
        Classification::Polynomial { degree, .. } => assert_eq!(degree, 3),
        other => panic!("expected polynomial, got {:?}", other),
    }
}

#[test]
fn test_classify_04() {
    // A doubling series is exponential.
    let xs = [10.0, 20.0, 30.0, 40.0, 50.0];
    let ys = [1024.0, 2048.0, 4096.0, 8192.0, 16384.0];
    match classify(&xs, &ys) {
        Classification::Exponential { r_squared } => assert!(r_squared >= 0.99),
        other => panic!("expected exponential, got {:?}", other),
    }
}

#[test]
fn test_classify_05() {
    // Fewer than four surviving points cannot be classified.
    let xs = [10.0, 20.0, 30.0];
    let ys = [10.0, 20.0, 30.0];
    assert_eq!(classify(&xs, &ys), Classification::Unknown);
}

#[test]
fn test_classify_06() {
    // Zero pairs are dropped before fitting; the remainder is linear.
    let xs = [0.0, 10.0, 50.0, 100.0, 200.0];
    let ys = [99.0, 10.0, 50.0, 100.0, 200.0];
    assert!(matches!(
        classify(&xs, &ys),
        Classification::Linear { .. }
    ));
}

#[test]
fn test_classify_07() {
    // Dropping zero pairs can push a series under the minimum.
    let xs = [0.0, 10.0, 20.0, 0.0, 30.0];
    let ys = [1.0, 10.0, 20.0, 1.0, 30.0];
    assert_eq!(classify(&xs, &ys), Classification::Unknown);
}

#[test]
fn test_classify_08() {
    // Linear data with mild noise still resolves to a linear or
    // degree-one verdict, never to a super-linear one.
    let xs = [16.0, 60.0, 104.0, 148.0, 192.0, 236.0];
    let ys = [33.1, 121.9, 209.2, 297.8, 384.5, 473.0];
    match classify(&xs, &ys) {
        Classification::Linear { .. } | Classification::Unknown => {}
        other => panic!("expected linear-ish, got {:?}", other),
    }
}

#[test]
fn test_classify_09() {
    // Noisy quadratic data: the polynomial fit survives small
    // perturbations.
    let xs = [15.0, 28.0, 41.0, 54.0, 67.0, 80.0, 93.0, 106.0];
    let ys: Vec<f64> = xs
        .iter()
        .enumerate()
        .map(|(i, x)| x * x * (1.0 + 0.01 * ((i % 3) as f64 - 1.0)))
        .collect();
    match classify(&xs, &ys) {
        Classification::Polynomial { degree, .. } => assert_eq!(degree, 2),
        other => panic!("expected polynomial, got {:?}", other),
    }
}

#[test]
fn test_classify_10() {
    // A flat series fits no growth model.
    let xs = [10.0, 20.0, 30.0, 40.0, 50.0];
    let ys = [7.0, 7.0, 7.0, 7.0, 7.0];
    let class = classify(&xs, &ys);
    assert!(
        !class.is_fastbreak(),
        "flat data must not break early: {:?}",
        class
    );
}
