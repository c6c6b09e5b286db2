mod common;

use common::budget_alloc::BudgetAlloc;
use common::fixtures::long_document;
use text2image_embedded_graphics::MonoFontBackend;
use text2image_render::{NoGlyphs, RenderEngine, RenderOptions};

const SECTIONS: usize = 40;
// Plans for the long fixture currently stay well under 1MiB.
// Keep a guardrail at 4MiB and ratchet downward as memory work lands.
const RENDER_PLAN_BUDGET_BYTES: usize = 4 * 1024 * 1024;

#[global_allocator]
static ALLOC: BudgetAlloc = BudgetAlloc::new();

#[test]
fn render_long_document_plan_under_budget() {
    let text = long_document(SECTIONS);
    let engine = RenderEngine::new(RenderOptions::default());
    let backend = MonoFontBackend;

    let baseline = ALLOC.live_bytes();
    ALLOC.reset_peak();
    let plan = engine
        .render(&text, &backend, &NoGlyphs)
        .unwrap_or_else(|e| panic!("render {} sections: {}", SECTIONS, e));
    let peak = ALLOC.peak_bytes().saturating_sub(baseline);

    assert!(
        plan.text_commands().count() >= SECTIONS * 5,
        "plan has only {} text commands",
        plan.text_commands().count()
    );
    assert!(
        peak <= RENDER_PLAN_BUDGET_BYTES,
        "render plan peak over budget: {} bytes ({:.1}KB), budget: {}KB",
        peak,
        peak as f64 / 1024.0,
        RENDER_PLAN_BUDGET_BYTES / 1024
    );
    println!(
        "render sections={} commands={} peak_kib={:.1}",
        SECTIONS,
        plan.commands.len(),
        peak as f64 / 1024.0
    );
}
