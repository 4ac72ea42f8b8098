use crate::error::{ForecastError, Result};
use crate::statement::Statement;
use std::path::Path;

const VALUE_WIDTH: usize = 12;

pub fn statement_to_json(statement: &Statement) -> Result<String> {
    Ok(serde_json::to_string_pretty(statement)?)
}

fn write_rows<W: std::io::Write>(writer: &mut csv::Writer<W>, statement: &Statement) -> Result<()> {
    let mut header = vec!["Line Item".to_string()];
    header.extend(statement.period_labels());
    writer.write_record(&header)?;

    for (item, values) in statement.lines() {
        let mut record = vec![item.label().to_string()];
        record.extend(values.iter().map(|v| format!("{:.2}", v)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// One row per line item, one column per period, values rounded to cents.
pub fn statement_to_csv(statement: &Statement) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_rows(&mut writer, statement)?;

    let bytes = writer
        .into_inner()
        .map_err(|e| ForecastError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| {
        ForecastError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

pub fn write_statement_csv(statement: &Statement, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    write_rows(&mut writer, statement)
}

/// Fixed-width text rendering for terminals and logs.
pub fn render_table(statement: &Statement) -> String {
    let label_width = statement
        .lines()
        .map(|(item, _)| item.label().len())
        .max()
        .unwrap_or(0)
        .max("Line Item".len());

    let mut output = String::new();
    output.push_str(&format!("{}\n", statement.kind()));

    output.push_str(&format!("{:<width$}", "Line Item", width = label_width));
    for label in statement.period_labels() {
        output.push_str(&format!(" {:>width$}", label, width = VALUE_WIDTH));
    }
    output.push('\n');

    let rule_width = label_width + statement.periods().len() * (VALUE_WIDTH + 1);
    output.push_str(&"-".repeat(rule_width));
    output.push('\n');

    for (item, values) in statement.lines() {
        output.push_str(&format!("{:<width$}", item.label(), width = label_width));
        for value in values {
            output.push_str(&format!(" {:>width$.2}", value, width = VALUE_WIDTH));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profit_loss::forecast_profit_loss;
    use crate::schema::ForecastConfig;

    fn reference_pl() -> Statement {
        let config = ForecastConfig::reference();
        forecast_profit_loss(
            &config.timeline().unwrap(),
            &config.profit_loss.historical,
            &config.profit_loss.assumptions,
        )
        .unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let csv = statement_to_csv(&reference_pl()).unwrap();
        let rows: Vec<&str> = csv.lines().collect();

        assert_eq!(rows[0], "Line Item,2023A,2024E,2025E,2026E");
        assert!(rows[1].starts_with("Revenue(A),1000.00,1150.00,1322.50,"));
        assert_eq!(rows.len(), 8);
        assert!(rows[7].starts_with("Net Profit"));
    }

    #[test]
    fn test_json_round_trip() {
        let pl = reference_pl();
        let json = statement_to_json(&pl).unwrap();
        let parsed: Statement = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.kind(), pl.kind());
        assert_eq!(parsed.periods(), pl.periods());
        for ((item, parsed_values), (_, values)) in parsed.lines().zip(pl.lines()) {
            for (a, b) in parsed_values.iter().zip(values) {
                assert!((a - b).abs() < 1e-9, "{} drifted: {} vs {}", item, a, b);
            }
        }
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&reference_pl());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "P&L");
        assert!(lines[1].contains("2026E"));
        assert!(lines[2].chars().all(|c| c == '-'));
        assert!(lines[3].starts_with("Revenue(A)"));
        assert!(lines[3].contains("1322.50"));
        // Every row has the same width.
        assert!(lines[1..].iter().all(|l| l.len() == lines[2].len()));
    }
}
