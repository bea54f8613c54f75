//! Large Expression Benchmark
//!
//! Benchmarks for expressions with many mixed terms (N >= 300) sharing
//! sub-expressions: construction, differentiation, normalization, compilation
//! and calls of the compiled function.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use symdag::{Domain, Expr, Value};

// =============================================================================
// Complex Expression Generator
// =============================================================================

/// Generates a complex mixed expression with N terms
/// Includes: polynomials, trig, exponentials, logs, fractions, nested functions
fn generate_mixed_complex(x: &Expr, n: i64) -> Expr {
    let mut terms = Vec::with_capacity(usize::try_from(n).unwrap_or_default());
    let ex = x.exp();
    for i in 1..=n {
        let sign: i64 = if i % 3 == 1 { -1 } else { 1 };
        let term = match i % 5 {
            // Polynomial term: i*x^i
            0 => i * x.powi(i % 10 + 1),
            // Trig term: sin(i*x) * cos(x)
            1 => (i * x).sin() * x.cos(),
            // Exponential/Log: exp(x/i) + log(x + i)
            2 => (x / i).exp() + (x + i).log(),
            // Rational: (x^2 + i) / (x + i)
            3 => (x.powi(2) + i) / (x + i),
            // Nested: sin(exp(x) + i)
            _ => (&ex + i).sin(),
        };
        terms.push(sign * term);
    }
    Expr::sum(terms).unwrap()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_large_expressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("complex_expressions_300");
    group.sample_size(10); // Very large exprs, reduce samples further
    group.measurement_time(std::time::Duration::from_secs(15));

    let n = 300;
    let x = Expr::symbol("x", Domain::Reals);

    group.bench_function("build_mixed_300", |b| {
        b.iter(|| generate_mixed_complex(black_box(&x), n))
    });

    let mixed = generate_mixed_complex(&x, n);

    // -------------------------------------------------------------------------
    // Differentiation and normalization
    // -------------------------------------------------------------------------

    group.bench_function("derive_mixed_300", |b| {
        b.iter(|| black_box(&mixed).derive(black_box(&x)))
    });

    let derivative = mixed.derive(&x).unwrap();

    group.bench_function("normalize_deriv_300", |b| {
        b.iter(|| black_box(&derivative).normalize())
    });

    // -------------------------------------------------------------------------
    // Compilation and calls
    // -------------------------------------------------------------------------

    group.bench_function("compile_deriv_300", |b| {
        b.iter(|| black_box(&derivative).compile(std::slice::from_ref(&x)))
    });

    let compiled = derivative.compile(std::slice::from_ref(&x)).unwrap();
    let args = [Value::Float(2.5)];

    group.bench_function("call_compiled_deriv_300", |b| {
        b.iter(|| compiled.evaluate(black_box(&args)))
    });

    group.bench_function("substitute_normalize_deriv_300", |b| {
        b.iter(|| {
            black_box(&derivative)
                .substitute(&[(x.clone(), Expr::real(2.5))])
                .and_then(|e| e.normalize())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_large_expressions);

criterion_main!(benches);
