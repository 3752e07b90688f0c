use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mosaic_core::{Breakpoint, EditOp, LayoutItem, Project, WidgetKind};
use mosaic_layout::{
    folder_row_span, push_down, Applied, EditBridge, GridMetrics, GridSolver, SolverConfig,
};
use std::hint::black_box;
use uuid::Uuid;

/// Layout of `n` items packed first-fit on a 12-column grid.
fn packed(n: usize, footprint: (u32, u32)) -> Vec<LayoutItem> {
    let solver = GridSolver::default();
    let mut items = Vec::with_capacity(n);
    for _ in 0..n {
        let item = solver.place_item(Uuid::new_v4(), footprint, footprint, &items, 12);
        items.push(item);
    }
    items
}

/// Benchmark: place one footprint into layouts of growing size
fn bench_place(c: &mut Criterion) {
    let mut group = c.benchmark_group("place_note");
    let solver = GridSolver::default();

    for count in [10, 100, 500] {
        let items = packed(count, (4, 2));
        group.bench_with_input(BenchmarkId::from_parameter(count), &items, |b, items| {
            b.iter(|| black_box(solver.place(black_box((4, 2)), items, 12)));
        });
    }

    group.finish();
}

/// Benchmark: a layout packed past the scan window hits the fallback path
fn bench_place_fallback(c: &mut Criterion) {
    let solver = GridSolver::new(SolverConfig::default());
    let items: Vec<LayoutItem> = (0..210)
        .map(|y| LayoutItem::new(Uuid::new_v4(), 0, y, 12, 1))
        .collect();

    c.bench_function("place_fallback_210_rows", |b| {
        b.iter(|| black_box(solver.place((4, 2), &items, 12)));
    });
}

/// Benchmark: folder at the top of a 200-item column grows by 10 rows
fn bench_push_down(c: &mut Criterion) {
    let anchor = Uuid::new_v4();
    let mut base = vec![LayoutItem::new(anchor, 0, 0, 4, 13)];
    base.extend((0..200).map(|i| LayoutItem::new(Uuid::new_v4(), 0, 3 + i * 2, 4, 2)));

    c.bench_function("push_down_200", |b| {
        b.iter(|| {
            let mut items = base.clone();
            black_box(push_down(&mut items, anchor))
        });
    });
}

/// Benchmark: add widgets through the bridge (five breakpoints each)
fn bench_bridge_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge_add");

    for count in [10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut bridge =
                    EditBridge::with_seed(SolverConfig::default(), GridMetrics::default(), 1);
                let mut project = Project::new("bench", "Bench");
                for i in 0..n {
                    let kind = WidgetKind::ALL[i % (WidgetKind::ALL.len() - 1)];
                    let op = EditOp::AddWidget {
                        kind,
                        parent_id: None,
                    };
                    if let Ok(Applied::Changed { project: next, .. }) = bridge.apply(&project, &op)
                    {
                        project = next;
                    }
                }
                black_box(project.layouts.get(Breakpoint::Lg).len())
            });
        });
    }

    group.finish();
}

/// Benchmark: row-span of a folder with a full nested grid
fn bench_folder_row_span(c: &mut Criterion) {
    let metrics = GridMetrics::default();
    let solver = GridSolver::default();
    let mut children = Vec::with_capacity(48);
    for _ in 0..48 {
        let item = solver.place_item(Uuid::new_v4(), (4, 2), (4, 2), &children, 24);
        children.push(item);
    }

    c.bench_function("folder_row_span_48", |b| {
        b.iter(|| black_box(folder_row_span(black_box(&children), 3, &metrics)));
    });
}

criterion_group!(
    benches,
    bench_place,
    bench_place_fallback,
    bench_push_down,
    bench_bridge_add,
    bench_folder_row_span
);
criterion_main!(benches);
