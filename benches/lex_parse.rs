//! Lex/parse throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sdlfront::parser::parse_file;
use sdlfront::Span;

const SMALL: &str = r#"
enum Status { OK FAIL PENDING }

component Cache {
    param capacity Int = 1024
    param ttl Float = 5s
    uses backend Store

    method get(key Str) Status {
        if self.capacity > 0 {
            return Status.OK
        }
        return Status.FAIL
    }
}
"#;

fn repeated_components(n: usize) -> String {
    let mut src = String::from("enum Status { OK FAIL }\n");
    for i in 0..n {
        src.push_str(&format!(
            "component C{i} {{ param size Int = {i} method m() Int {{ return self.size + 1 * 2 - 3 }} }}\n"
        ));
    }
    src
}

fn bench_lex(c: &mut Criterion) {
    c.bench_function("lex_small_file", |b| {
        b.iter(|| {
            let lexer = sdlfront::lexer::Lexer::new(black_box(SMALL));
            let tokens: Vec<_> = lexer.collect();
            black_box(tokens.len())
        })
    });
}

fn bench_parse_small(c: &mut Criterion) {
    c.bench_function("parse_small_file", |b| {
        b.iter(|| {
            let (file, errors) = parse_file("bench.sdl", black_box(SMALL));
            black_box((file, errors))
        })
    });
}

fn bench_parse_large(c: &mut Criterion) {
    let large = repeated_components(200);
    c.bench_function("parse_200_components", |b| {
        b.iter(|| {
            let (file, errors) = parse_file("bench.sdl", black_box(&large));
            black_box((file, errors))
        })
    });
}

fn bench_span_merge(c: &mut Criterion) {
    let a = Span::default();
    let b = Span::default();
    c.bench_function("span_merge", |bencher| {
        bencher.iter(|| black_box(a).merge(black_box(&b)))
    });
}

criterion_group!(benches, bench_lex, bench_parse_small, bench_parse_large, bench_span_merge);
criterion_main!(benches);
