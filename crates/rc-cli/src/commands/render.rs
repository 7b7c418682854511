//! Human-readable rendering for ledger views.

use std::io::{self, Write};

use rc_core::View;
use rc_core::views::{BarView, TableView, TrendView};

/// Cells in a rendered bar.
const BAR_WIDTH: usize = 20;

/// Renders any view as text.
pub fn write_view<W: Write>(writer: &mut W, view: &View) -> io::Result<()> {
    match view {
        View::Summary(bars) => write_summary(writer, bars),
        View::Trend(trend) => write_trend(writer, trend),
        View::History(table) => write_history(writer, table),
    }
}

/// Renders a view as pretty JSON.
pub fn write_view_json<W: Write>(writer: &mut W, view: &View) -> anyhow::Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(view)?)?;
    Ok(())
}

fn write_summary<W: Write>(writer: &mut W, view: &BarView) -> io::Result<()> {
    writeln!(writer, "RECYCLING SUMMARY")?;
    writeln!(writer)?;
    let max = view.max_count();
    for bar_data in &view.bars {
        writeln!(
            writer,
            "{:<10} {}  {}",
            bar_data.material.display_name(),
            bar(bar_data.count, max),
            bar_data.count
        )?;
    }
    writeln!(writer)?;
    writeln!(
        writer,
        "Items: {}  Credits: {}",
        view.total_items, view.total_credits
    )
}

fn write_trend<W: Write>(writer: &mut W, view: &TrendView) -> io::Result<()> {
    writeln!(writer, "CUMULATIVE CREDITS")?;
    writeln!(writer)?;
    for series in &view.series {
        let values = if series.points.is_empty() {
            "-".to_string()
        } else {
            series
                .points
                .iter()
                .map(|p| p.y.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        writeln!(writer, "{:<10} {values}", series.material.display_name())?;
    }
    Ok(())
}

fn write_history<W: Write>(writer: &mut W, view: &TableView) -> io::Result<()> {
    writeln!(writer, "DETECTION HISTORY")?;
    writeln!(writer)?;
    if view.rows.is_empty() {
        writeln!(writer, "No detections recorded.")?;
    } else {
        writeln!(writer, "DATE        TIME      MATERIAL   CREDITS")?;
        for row in &view.rows {
            writeln!(
                writer,
                "{}  {}  {:<10} {}",
                row.date.format("%Y-%m-%d"),
                row.time.format("%H:%M:%S"),
                row.material.display_name(),
                row.credits
            )?;
        }
    }
    if view.dropped > 0 {
        writeln!(writer)?;
        writeln!(
            writer,
            "({} rows with unreadable timestamps hidden)",
            view.dropped
        )?;
    }
    Ok(())
}

/// Generates a fixed-width bar scaled against `max`.
/// Nonzero values below 5% of max still get a single block.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn bar(value: u64, max: u64) -> String {
    if max == 0 {
        return "░".repeat(BAR_WIDTH);
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * BAR_WIDTH as f64).round().min(BAR_WIDTH as f64) as usize
    };

    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use rc_core::views::RawRow;
    use rc_core::{DetectionLedger, Material, ViewKind};

    fn ledger() -> DetectionLedger {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut ledger = DetectionLedger::new();
        ledger.record(Material::Plastic, base);
        ledger.record(Material::Metal, base + chrono::Duration::seconds(5));
        ledger.record(Material::Plastic, base + chrono::Duration::seconds(9));
        ledger
    }

    fn render(view: &View) -> String {
        let mut output = Vec::new();
        write_view(&mut output, view).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn bar_scales_to_max() {
        assert_eq!(bar(0, 0), "░".repeat(20));
        assert_eq!(bar(2, 2), "█".repeat(20));
        assert_eq!(bar(1, 2), format!("{}{}", "█".repeat(10), "░".repeat(10)));
        assert_eq!(bar(1, 100), format!("█{}", "░".repeat(19)));
    }

    #[test]
    fn summary_output() {
        let output = render(&ViewKind::Summary.project(&ledger()));
        assert_snapshot!(output, @r"
        RECYCLING SUMMARY

        Cardboard  ░░░░░░░░░░░░░░░░░░░░  0
        Metal      ██████████░░░░░░░░░░  1
        Paper      ░░░░░░░░░░░░░░░░░░░░  0
        Plastic    ████████████████████  2

        Items: 3  Credits: 22
        ");
    }

    #[test]
    fn trend_output() {
        let output = render(&ViewKind::Trend.project(&ledger()));
        assert_snapshot!(output, @r"
        CUMULATIVE CREDITS

        Cardboard  -
        Metal      10
        Paper      -
        Plastic    6 12
        ");
    }

    #[test]
    fn history_output() {
        let output = render(&ViewKind::History.project(&ledger()));
        assert_snapshot!(output, @r"
        DETECTION HISTORY

        DATE        TIME      MATERIAL   CREDITS
        2025-06-01  12:00:00  Plastic    6
        2025-06-01  12:00:05  Metal      10
        2025-06-01  12:00:09  Plastic    6
        ");
    }

    #[test]
    fn history_output_notes_hidden_rows() {
        let table = TableView::from_rows([
            RawRow {
                timestamp: "2025-06-01T12:00:00Z",
                material: Material::Paper,
                credits: 5,
            },
            RawRow {
                timestamp: "??",
                material: Material::Metal,
                credits: 10,
            },
        ]);
        let output = render(&View::History(table));
        assert_snapshot!(output, @r"
        DETECTION HISTORY

        DATE        TIME      MATERIAL   CREDITS
        2025-06-01  12:00:00  Paper      5

        (1 rows with unreadable timestamps hidden)
        ");
    }

    #[test]
    fn empty_history_output() {
        let output = render(&ViewKind::History.project(&DetectionLedger::new()));
        assert_snapshot!(output, @r"
        DETECTION HISTORY

        No detections recorded.
        ");
    }

    #[test]
    fn json_output_is_tagged() {
        let mut output = Vec::new();
        write_view_json(&mut output, &ViewKind::Trend.project(&ledger())).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["view"], "trend");
        assert_eq!(value["series"][3]["points"][1]["y"], 12);
    }
}
