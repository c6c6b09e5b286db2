use std::alloc::{GlobalAlloc, Layout, System};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use text2image::{PrepOptions, RenderPrep};
use text2image_embedded_graphics::{EgRenderer, OutputFormat};
use text2image_render::{NoGlyphs, RenderEngine, RenderOptions};

const SAMPLE_SECTION: &str = "## Release notes 🚀\n\
Paragraph with **bold**, *italic*, ~~struck~~ and `inline code` that keeps going long enough to wrap twice.\n\
> Quoted guidance that also wraps across the card width at the default scale.\n\
- first bullet with 👍🏽\n  - nested bullet\n\
1. ordered entry\n\
\n\
| Name | Role | Since |\n\
|------|------|-------|\n\
| Alice | Lead | 2019 |\n\
| Bob | Dev | 2021 |\n\
\n\
```\n\
let total = items.iter().sum::<u32>();\n\
```\n\
---\n";

const FIXTURES: &[(&str, usize)] = &[("short", 1), ("medium", 8), ("long", 32)];

struct TrackingAllocator;

static CURRENT_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL_ALLOCATOR: TrackingAllocator = TrackingAllocator;

fn current_alloc_bytes() -> usize {
    CURRENT_ALLOC_BYTES.load(Ordering::Relaxed)
}

fn peak_alloc_bytes() -> usize {
    PEAK_ALLOC_BYTES.load(Ordering::Relaxed)
}

fn reset_peak_alloc_bytes() {
    let current = current_alloc_bytes();
    PEAK_ALLOC_BYTES.store(current, Ordering::Relaxed);
}

fn add_current_alloc_bytes(delta: usize) {
    let current = CURRENT_ALLOC_BYTES.fetch_add(delta, Ordering::Relaxed) + delta;
    PEAK_ALLOC_BYTES.fetch_max(current, Ordering::Relaxed);
}

fn sub_current_alloc_bytes(delta: usize) {
    let _ = CURRENT_ALLOC_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(delta))
    });
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        sub_current_alloc_bytes(layout.size());
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                add_current_alloc_bytes(new_size - layout.size());
            } else {
                sub_current_alloc_bytes(layout.size() - new_size);
            }
        }
        new_ptr
    }
}

#[derive(Clone, Debug)]
struct CaseResult {
    fixture: String,
    case: String,
    iterations: usize,
    min_ns: u128,
    median_ns: u128,
    mean_ns: u128,
    max_ns: u128,
    median_peak_heap_bytes: usize,
    max_peak_heap_bytes: usize,
}

fn percentile<T: Copy>(sorted: &[T], percentile: f64) -> T {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn run_case<F>(
    fixture: &str,
    case: &str,
    warmup_iters: usize,
    measure_iters: usize,
    mut op: F,
) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..warmup_iters {
        black_box(op());
    }

    let mut time_samples = Vec::with_capacity(measure_iters);
    let mut mem_samples = Vec::with_capacity(measure_iters);
    for _ in 0..measure_iters {
        let baseline_alloc = current_alloc_bytes();
        reset_peak_alloc_bytes();
        let start = Instant::now();
        black_box(op());
        time_samples.push(start.elapsed().as_nanos());
        mem_samples.push(peak_alloc_bytes().saturating_sub(baseline_alloc));
    }

    time_samples.sort_unstable();
    mem_samples.sort_unstable();
    let time_sum: u128 = time_samples.iter().copied().sum();

    CaseResult {
        fixture: fixture.to_string(),
        case: case.to_string(),
        iterations: measure_iters,
        min_ns: time_samples[0],
        median_ns: percentile(&time_samples, 0.5),
        mean_ns: time_sum / time_samples.len() as u128,
        max_ns: time_samples[time_samples.len() - 1],
        median_peak_heap_bytes: percentile(&mem_samples, 0.5),
        max_peak_heap_bytes: mem_samples[mem_samples.len() - 1],
    }
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let warmup_iters = if quick { 1 } else { 3 };
    let measure_iters = if quick { 3 } else { 15 };

    println!("# text2image benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        warmup_iters,
        measure_iters
    );
    println!(
        "fixture,case,iterations,min_ns,median_ns,mean_ns,max_ns,median_peak_heap_bytes,max_peak_heap_bytes"
    );

    let renderer: EgRenderer = EgRenderer::default();
    let engine = RenderEngine::new(RenderOptions::default());

    let mut results = Vec::new();
    for (fixture_key, sections) in FIXTURES {
        let text = SAMPLE_SECTION.repeat(*sections);

        results.push(run_case(
            fixture_key,
            "prepare_blocks",
            warmup_iters,
            measure_iters,
            || RenderPrep::prepare(&text, PrepOptions::default()).len(),
        ));

        results.push(run_case(
            fixture_key,
            "render_plan",
            warmup_iters,
            measure_iters,
            || {
                let plan = engine
                    .render(&text, renderer.backend(), &NoGlyphs)
                    .unwrap_or_else(|e| panic!("render failed: {}", e));
                plan.commands.len()
            },
        ));

        results.push(run_case(
            fixture_key,
            "rasterize_png",
            warmup_iters,
            measure_iters,
            || {
                let plan = engine
                    .render(&text, renderer.backend(), &NoGlyphs)
                    .unwrap_or_else(|e| panic!("render failed: {}", e));
                let canvas = renderer.render_to_canvas(&plan);
                canvas
                    .encode(OutputFormat::Png)
                    .unwrap_or_else(|e| panic!("encode failed: {}", e))
                    .len()
            },
        ));
    }

    for result in &results {
        println!(
            "{},{},{},{},{},{},{},{},{}",
            result.fixture,
            result.case,
            result.iterations,
            result.min_ns,
            result.median_ns,
            result.mean_ns,
            result.max_ns,
            result.median_peak_heap_bytes,
            result.max_peak_heap_bytes
        );
    }
}
