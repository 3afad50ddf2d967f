//! Throughput of the scope-export parser on a large synthetic export.
//!
//! `full_parse` covers probing, analysis, metadata and table building;
//! `structure_only` isolates the line classifier.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use scope_csv::structure::StructureAnalyzer;
use scope_csv::{ComplexCsvParser, Delimiter, ParseOptions, ParserConfig};
use std::fmt::Write as _;
use tempfile::NamedTempFile;

const CHANNELS: usize = 8;

fn synthetic_export(rows: usize) -> String {
    let mut text = String::from("Name\tBenchRun\nFile\tC:\\scope\\bench.svdx\n\n");
    for c in 0..CHANNELS {
        let _ = write!(text, "Name\tChannel{}\t", c);
    }
    text.push('\n');
    for c in 0..CHANNELS {
        let _ = write!(text, "Data-Type\tREAL64\t{}", if c + 1 < CHANNELS { "" } else { "\n" });
    }
    text.push('\n');
    for row in 0..rows {
        for c in 0..CHANNELS {
            let _ = write!(text, "{}\t{:.4}\t", row, (row * (c + 1)) as f64 * 0.001);
        }
        text.push('\n');
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_parse");
    for rows in [1_000usize, 20_000] {
        let content = synthetic_export(rows);
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &content).unwrap();

        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            let config = ParserConfig::default().with_progress_interval(0);
            let mut parser = ComplexCsvParser::with_config(config).unwrap();
            b.iter(|| {
                let outcome = parser
                    .parse_complex_csv(black_box(file.path()), &ParseOptions::new())
                    .unwrap();
                black_box(outcome.table.num_rows())
            });
        });
    }
    group.finish();
}

fn bench_structure(c: &mut Criterion) {
    let lines: Vec<String> = synthetic_export(20_000).lines().map(str::to_string).collect();
    let config = ParserConfig::default();
    let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);

    c.bench_function("structure_only", |b| {
        b.iter(|| black_box(analyzer.analyze(black_box(&lines), None, None)))
    });
}

criterion_group!(benches, bench_parse, bench_structure);
criterion_main!(benches);
