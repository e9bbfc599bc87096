use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sqlcache::{format_statement, DigestAlgorithm, Fingerprinter, SqlValue};

const STATEMENT: &str = "SELECT u.id, u.name, o.total
    FROM users u
    JOIN orders o ON o.user_id = u.id
    WHERE u.id = ? AND o.status IN (?)";

fn benchmark_fingerprint(c: &mut Criterion) {
    for algorithm in [
        DigestAlgorithm::Sha512,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha224,
        DigestAlgorithm::Md5,
    ] {
        let fingerprinter = Fingerprinter::new(algorithm);
        c.bench_function(&format!("fingerprint_{}", algorithm.name()), |b| {
            b.iter(|| fingerprinter.fingerprint(black_box(STATEMENT)))
        });
    }
}

fn benchmark_format_statement(c: &mut Criterion) {
    let params = vec![
        SqlValue::from(42),
        SqlValue::List(vec!["paid".into(), "shipped".into(), "it's".into()]),
    ];
    c.bench_function("format_statement", |b| {
        b.iter(|| format_statement(black_box(STATEMENT), black_box(&params)))
    });
}

criterion_group!(benches, benchmark_fingerprint, benchmark_format_statement);
criterion_main!(benches);
