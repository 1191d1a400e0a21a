use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ragq_core::model::{Candidate, Metadata};
use ragq_search::fusion::{DEFAULT_ALPHA, fuse, rank_top_k};
use ragq_search::lexical::{Bm25Params, score_local};

const WORDS: &[&str] = &[
    "visa", "status", "transfer", "leave", "policy", "expense", "report", "remote", "stipend",
    "badge", "access", "benefits", "enrollment", "payroll", "holiday", "manager", "approval",
];

fn synthetic_candidates(n: usize, seed: u64) -> Vec<Candidate> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        state >> 33
    };

    (0..n)
        .map(|i| {
            let len = 40 + (next() % 80) as usize;
            let text = (0..len)
                .map(|_| WORDS[(next() as usize) % WORDS.len()])
                .collect::<Vec<_>>()
                .join(" ");
            Candidate {
                chunk_id: format!("c{i}"),
                text,
                metadata: Metadata::new(),
                distance: i as f64 / n as f64,
            }
        })
        .collect()
}

fn bench_rerank(c: &mut Criterion) {
    let mut group = c.benchmark_group("hybrid.rerank");
    let params = Bm25Params::default();

    for n in [50_usize, 200, 1000] {
        let candidates = synthetic_candidates(n, 0x5EED_u64 + n as u64);
        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("bm25", n), &texts, |b, texts| {
            b.iter(|| black_box(score_local("visa status transfer", texts, &params)));
        });

        let bm25 = score_local("visa status transfer", &texts, &params);
        group.bench_with_input(
            BenchmarkId::new("fuse_rank", n),
            &candidates,
            |b, candidates| {
                b.iter(|| {
                    black_box(rank_top_k(
                        fuse(candidates.clone(), &bm25, DEFAULT_ALPHA),
                        8,
                    ))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_rerank);
criterion_main!(benches);
