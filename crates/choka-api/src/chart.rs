//! Monthly catch charts for the search page.

use std::fmt::Write;

/// Renders a bar chart to image bytes. Swappable so the server is not tied
/// to one image format.
pub trait ChartRenderer: Send + Sync {
    fn render_bar_chart(&self, categories: &[u32; 12], counts: &[u32; 12]) -> anyhow::Result<Vec<u8>>;

    fn content_type(&self) -> &'static str;
}

/// Plain SVG output: x axis "month", y axis "posts", each bar labelled with
/// its count.
#[derive(Debug, Clone)]
pub struct SvgBarChart {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgBarChart {
    fn default() -> Self {
        Self { width: 640, height: 360 }
    }
}

const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 24.0;
const MARGIN_BOTTOM: f64 = 48.0;

impl ChartRenderer for SvgBarChart {
    fn render_bar_chart(&self, categories: &[u32; 12], counts: &[u32; 12]) -> anyhow::Result<Vec<u8>> {
        let width = self.width as f64;
        let height = self.height as f64;
        let plot_w = width - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = height - MARGIN_TOP - MARGIN_BOTTOM;
        anyhow::ensure!(plot_w > 0.0 && plot_h > 0.0, "chart area too small: {}x{}", self.width, self.height);

        // Keep a flat chart readable when nothing matched.
        let max = counts.iter().copied().max().unwrap_or(0).max(1) as f64;
        let slot = plot_w / categories.len() as f64;
        let bar_w = slot * 0.7;
        let base_y = MARGIN_TOP + plot_h;

        let mut svg = String::new();
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        )?;
        writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##)?;
        writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{base_y}" x2="{x2}" y2="{base_y}" stroke="#333333"/>"##,
            x2 = MARGIN_LEFT + plot_w
        )?;
        writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{base_y}" stroke="#333333"/>"##
        )?;

        for (i, (category, count)) in categories.iter().zip(counts.iter()).enumerate() {
            let bar_h = *count as f64 / max * plot_h;
            let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_w) / 2.0;
            let y = base_y - bar_h;
            let center = x + bar_w / 2.0;
            writeln!(
                svg,
                r##"<rect class="bar" x="{x:.1}" y="{y:.1}" width="{bar_w:.1}" height="{bar_h:.1}" fill="#4a90d9"/>"##
            )?;
            writeln!(
                svg,
                r#"<text class="count" x="{center:.1}" y="{:.1}" font-size="12" text-anchor="middle">{count}</text>"#,
                y - 4.0
            )?;
            writeln!(
                svg,
                r#"<text class="tick" x="{center:.1}" y="{:.1}" font-size="12" text-anchor="middle">{category}</text>"#,
                base_y + 16.0
            )?;
        }

        writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="14" text-anchor="middle">month</text>"#,
            MARGIN_LEFT + plot_w / 2.0,
            height - 10.0
        )?;
        writeln!(
            svg,
            r#"<text x="16" y="{y:.1}" font-size="14" text-anchor="middle" transform="rotate(-90 16 {y:.1})">posts</text>"#,
            y = MARGIN_TOP + plot_h / 2.0
        )?;
        svg.push_str("</svg>\n");

        Ok(svg.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        "image/svg+xml"
    }
}

/// Months 1 to 12, the x axis of every histogram chart.
pub fn months() -> [u32; 12] {
    std::array::from_fn(|i| i as u32 + 1)
}
