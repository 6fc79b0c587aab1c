use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use echem_summary::data::model::Curve;
use echem_summary::FeatureSummary;

// ---------------------------------------------------------------------------
// Summary table
// ---------------------------------------------------------------------------

/// Two-column `feature`/`value` batch built from the summary table.
pub fn summary_batch(summary: &FeatureSummary) -> Result<RecordBatch> {
    let rows = summary.table();
    let schema = Arc::new(Schema::new(vec![
        Field::new("feature", DataType::Utf8, false),
        Field::new("value", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            rows.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        )),
    ];
    RecordBatch::try_new(schema, columns).context("building summary table")
}

// ---------------------------------------------------------------------------
// Curve export
// ---------------------------------------------------------------------------

fn curves_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("curve", DataType::Utf8, false),
        Field::new("voltage", DataType::Float64, false),
        Field::new("specific_capacity", DataType::Float64, false),
        Field::new("is_plateau_point", DataType::Boolean, false),
    ]))
}

/// Long-format batch holding both cleaned curves, one row per grid point.
/// The row nearest each plateau marker is flagged.
pub fn curves_batch(summary: &FeatureSummary) -> Result<RecordBatch> {
    let mut names: Vec<&str> = Vec::new();
    let mut voltage: Vec<f64> = Vec::new();
    let mut capacity: Vec<f64> = Vec::new();
    let mut marker: Vec<bool> = Vec::new();

    let halves = [
        ("discharge", &summary.discharge_curve, summary.discharge_plateau.voltage),
        ("charge", &summary.charge_curve, summary.charge_plateau.voltage),
    ];
    for (name, curve, plateau_voltage) in halves {
        let flagged = nearest_voltage(curve, plateau_voltage);
        for (i, (v, c)) in curve.points().enumerate() {
            names.push(name);
            voltage.push(v);
            capacity.push(c);
            marker.push(Some(i) == flagged);
        }
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(names)),
        Arc::new(Float64Array::from(voltage)),
        Arc::new(Float64Array::from(capacity)),
        Arc::new(BooleanArray::from(marker)),
    ];
    RecordBatch::try_new(curves_schema(), columns).context("building curve batch")
}

fn nearest_voltage(curve: &Curve, target: f64) -> Option<usize> {
    curve
        .voltage
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
        .map(|(i, _)| i)
}

/// Write both curves of `summary` to a Parquet file.
pub fn write_curves(summary: &FeatureSummary, path: &Path) -> Result<usize> {
    let batch = curves_batch(summary)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing curve batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(batch.num_rows())
}
