// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the job diff engine: the hot path of every watch
// cycle, run once per notification wake.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use spoolwatch_core::types::{JobId, JobStatus, PrintJob};
use spoolwatch_spooler::diff::{diff, Snapshot};

fn job(id: u32) -> PrintJob {
    PrintJob {
        id: JobId(id),
        printer_name: "Bench Queue".into(),
        user_name: "bench".into(),
        document_name: format!("document-{id}.pdf"),
        status: JobStatus::SPOOLING,
        position: id,
        pages_printed: 0,
        total_pages: 20,
        size_bytes: 65_536,
        bytes_printed: 0,
        submitted_at: chrono::Utc::now(),
    }
}

fn snapshot(ids: std::ops::Range<u32>) -> Snapshot {
    Snapshot::from_jobs(ids.map(job))
}

/// The common case: a wake with nothing actually changed.
fn bench_diff_unchanged(c: &mut Criterion) {
    let previous = snapshot(0..200);
    let current = snapshot(0..200);

    c.bench_function("diff (200 jobs, unchanged)", |b| {
        b.iter(|| {
            let changes = diff(black_box(&previous), black_box(&current));
            assert!(changes.is_empty());
        });
    });
}

/// Queue churn: a window of jobs finished while new ones arrived.
fn bench_diff_churn(c: &mut Criterion) {
    let previous = snapshot(0..200);
    let current = snapshot(50..250);

    c.bench_function("diff (200 jobs, 50 added + 50 deleted)", |b| {
        b.iter(|| {
            let changes = diff(black_box(&previous), black_box(&current));
            assert_eq!(changes.len(), 100);
        });
    });
}

/// Every job progressed: the printer is actively draining the queue.
fn bench_diff_progress(c: &mut Criterion) {
    let previous = snapshot(0..200);
    let current = Snapshot::from_jobs((0..200).map(|id| {
        let mut j = job(id);
        j.pages_printed = 1;
        j.bytes_printed = 4_096;
        j
    }));

    c.bench_function("diff (200 jobs, all progressed)", |b| {
        b.iter(|| {
            let changes = diff(black_box(&previous), black_box(&current));
            assert_eq!(changes.len(), 400);
        });
    });
}

criterion_group!(
    benches,
    bench_diff_unchanged,
    bench_diff_churn,
    bench_diff_progress,
);
criterion_main!(benches);
