use super::types::{LayoutPlan, MeasuredLine, PlannedLine, Rect};
use crate::WatermarkConfig;

/// Font pixel size for a ratio, scaled against the shortest image side.
pub fn font_px(ratio: f32, width: u32, height: u32) -> u32 {
    let base = width.min(height) as f32;
    (ratio * base).round().max(1.0) as u32
}

/// Computes the watermark layout for an image. Deterministic: the same
/// dimensions, configuration, and measured lines always yield the same plan.
///
/// Lines are given in top-to-bottom order (location above time when both are
/// present). The block anchors to the bottom-right corner; when it cannot fit
/// it clamps to the image origin and lines fall back to left alignment. The
/// backdrop is the union of the line boxes grown by the padding on every side,
/// clamped to the image bounds.
pub fn compute_layout(
    width: u32,
    height: u32,
    config: &WatermarkConfig,
    lines: &[MeasuredLine],
) -> LayoutPlan {
    if lines.is_empty() {
        return LayoutPlan {
            lines: Vec::new(),
            backdrop: Rect {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            },
        };
    }

    let base = width.min(height) as f32;
    let margin = (config.margin_ratio * base).round() as i64;
    let padding = (config.padding_ratio * base).round() as i64;

    // Line gap derives from the primary (time) font size, treating
    // line_spacing as a line-advance multiplier.
    let time_px = font_px(config.time_font_size_ratio, width, height) as f32;
    let gap = ((config.line_spacing - 1.0).max(0.0) * time_px).round() as i64;

    let block_w: i64 = lines.iter().map(|l| l.width as i64).max().unwrap_or(0);
    let block_h: i64 = lines.iter().map(|l| l.height as i64).sum::<i64>()
        + gap * (lines.len() as i64 - 1);

    let anchored_x = width as i64 - margin - padding - block_w;
    let anchored_y = height as i64 - margin - padding - block_h;
    let overflow_x = anchored_x < 0;
    let block_x = anchored_x.max(0);
    let block_y = anchored_y.max(0);

    let mut planned = Vec::with_capacity(lines.len());
    let mut cursor_y = block_y;
    for line in lines {
        let line_x = if overflow_x {
            block_x
        } else {
            block_x + (block_w - line.width as i64)
        };
        planned.push(PlannedLine {
            slot: line.slot,
            text: line.text.clone(),
            font_px: line.font_px,
            rect: clamp_rect(line_x, cursor_y, line.width as i64, line.height as i64, width, height),
        });
        cursor_y += line.height as i64 + gap;
    }

    let backdrop = clamp_rect(
        block_x - padding,
        block_y - padding,
        block_w + padding * 2,
        block_h + padding * 2,
        width,
        height,
    );

    LayoutPlan {
        lines: planned,
        backdrop,
    }
}

fn clamp_rect(x: i64, y: i64, w: i64, h: i64, bound_w: u32, bound_h: u32) -> Rect {
    let x0 = x.clamp(0, bound_w as i64);
    let y0 = y.clamp(0, bound_h as i64);
    let x1 = (x + w).clamp(0, bound_w as i64);
    let y1 = (y + h).clamp(0, bound_h as i64);
    Rect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::types::LineSlot;

    fn test_config() -> WatermarkConfig {
        WatermarkConfig::default()
    }

    fn line(slot: LineSlot, text: &str, font_px: u32, width: u32, height: u32) -> MeasuredLine {
        MeasuredLine {
            slot,
            text: text.to_string(),
            font_px,
            width,
            height,
        }
    }

    #[test]
    fn identical_inputs_yield_identical_plans() {
        let config = test_config();
        let lines = vec![
            line(LineSlot::Location, "Hangzhou", 60, 400, 70),
            line(LineSlot::Time, "2024-05-01  10:30:00", 80, 600, 90),
        ];
        let a = compute_layout(4000, 3000, &config, &lines);
        let b = compute_layout(4000, 3000, &config, &lines);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_lines_yield_empty_plan() {
        let plan = compute_layout(4000, 3000, &test_config(), &[]);
        assert!(plan.is_empty());
        assert_eq!(plan.backdrop.width, 0);
    }

    #[test]
    fn block_anchors_bottom_right() {
        let config = test_config();
        let lines = vec![line(LineSlot::Time, "2024-05-01  10:30:00", 80, 600, 90)];
        let plan = compute_layout(4000, 3000, &config, &lines);

        let text = &plan.lines[0].rect;
        assert!(text.right() < 4000);
        assert!(text.bottom() < 3000);
        // Closer to the bottom-right corner than to the top-left.
        assert!(text.x > 2000);
        assert!(text.y > 1500);
    }

    #[test]
    fn location_line_sits_above_time_line() {
        let config = test_config();
        let lines = vec![
            line(LineSlot::Location, "Hangzhou", 60, 400, 70),
            line(LineSlot::Time, "2024-05-01  10:30:00", 80, 600, 90),
        ];
        let plan = compute_layout(4000, 3000, &config, &lines);
        assert_eq!(plan.lines[0].slot, LineSlot::Location);
        assert_eq!(plan.lines[1].slot, LineSlot::Time);
        assert!(plan.lines[0].rect.y < plan.lines[1].rect.y);
        // Lines are right-aligned within the block.
        assert_eq!(plan.lines[0].rect.right(), plan.lines[1].rect.right());
    }

    #[test]
    fn backdrop_contains_all_lines_with_padding() {
        let config = test_config();
        let lines = vec![
            line(LineSlot::Location, "Hangzhou", 60, 400, 70),
            line(LineSlot::Time, "2024-05-01  10:30:00", 80, 600, 90),
        ];
        let plan = compute_layout(4000, 3000, &config, &lines);
        for l in &plan.lines {
            assert!(l.rect.x >= plan.backdrop.x);
            assert!(l.rect.y >= plan.backdrop.y);
            assert!(l.rect.right() <= plan.backdrop.right());
            assert!(l.rect.bottom() <= plan.backdrop.bottom());
        }
    }

    #[test]
    fn oversized_text_clamps_to_image_bounds() {
        let config = test_config();
        // Text wider and taller than the image itself.
        let lines = vec![line(LineSlot::Time, "2024-05-01  10:30:00", 80, 900, 200)];
        let plan = compute_layout(100, 80, &config, &lines);

        assert!(plan.backdrop.right() <= 100);
        assert!(plan.backdrop.bottom() <= 80);
        // Left-aligned inside the clamp.
        assert_eq!(plan.lines[0].rect.x, 0);
    }

    #[test]
    fn font_px_scales_with_shortest_side() {
        assert_eq!(font_px(0.04, 4000, 3000), 120);
        assert_eq!(font_px(0.04, 3000, 4000), 120);
        // Never collapses to zero.
        assert_eq!(font_px(0.001, 10, 10), 1);
    }
}
