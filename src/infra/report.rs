// ============================================================
// Layer 6 — Console Report
// ============================================================
// Renders one MemoryReport as a titled block:
//
//   ====== Memory usage: epoch 1, iteration 20 ======
//   Peak allocated        :      35 MB
//   ...
//   Weights               :       8 MB
//       a.weight          :       5 MB
//       b.weight          :       3 MB
//   Gradients             :       9 MB
//       a.weight          :       5 MB
//       b.weight          :       3 MB
//       intermediate      :       1 MB
//   =================================================
//
// Figures are converted with MemoryUnit::convert, which rounds
// to the nearest whole unit.

use crate::profiler::lifecycle::MemoryReport;
use crate::profiler::units::MemoryUnit;

const LABEL_WIDTH: usize = 22;

fn line(label: &str, bytes: u64, unit: MemoryUnit) -> String {
    format!("{:<width$}: {:>7} {}", label, unit.convert(bytes), unit, width = LABEL_WIDTH)
}

fn indented(label: &str, bytes: u64, unit: MemoryUnit) -> String {
    // Indent eats into the label column so the figures stay aligned
    let label = format!("    {label}");
    line(&label, bytes, unit)
}

pub fn render_report(report: &MemoryReport, unit: MemoryUnit) -> String {
    let title = format!(" Memory usage: epoch {}, iteration {} ", report.epoch, report.iteration);
    let rule = "=".repeat(title.len() + 12);

    let mut lines = vec![format!("======{title}======")];
    lines.push(line("Peak allocated", report.device.peak_allocated, unit));
    lines.push(line("Current allocated", report.device.current_allocated, unit));
    lines.push(line("Peak cached", report.device.peak_reserved, unit));
    lines.push(line("Current cached", report.device.current_reserved, unit));
    lines.push("-".repeat(rule.len()));
    lines.push(line("Activations", report.activation_bytes, unit));

    lines.push(line("Weights", report.weight_bytes, unit));
    for (name, bytes) in &report.weight_breakdown {
        lines.push(indented(name, *bytes, unit));
    }

    lines.push(line("Gradients", report.gradient_bytes, unit));
    for (name, bytes) in &report.gradient_breakdown {
        lines.push(indented(name, *bytes, unit));
    }
    lines.push(indented("intermediate", report.intermediate_gradient_bytes, unit));
    lines.push(rule);

    lines.join("\n")
}
