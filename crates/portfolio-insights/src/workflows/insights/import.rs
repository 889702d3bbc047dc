//! Ingestion boundary for metric snapshots coming from the metrics pipeline.
//!
//! Snapshots arrive with string-typed enums. Exports are read record by record: a record that
//! does not deserialize is set aside as malformed, and conversion into [`MetricSnapshot`] is
//! where unknown metric types or periods are rejected.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{ComparisonPeriod, MetricSnapshot, MetricType, PropertyId};

/// Snapshot as supplied by the metrics pipeline, before enum validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricSnapshot {
    pub property_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub property_name: Option<String>,
    pub metric_type: String,
    pub property_value: f64,
    pub portfolio_average: f64,
    #[serde(default)]
    pub peer_group_average: Option<f64>,
    pub comparison_period: String,
}

/// Why a raw snapshot was dropped at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotRejection {
    #[error("snapshot is missing a property id")]
    MissingPropertyId,
    #[error("unknown metric type '{0}'")]
    UnknownMetricType(String),
    #[error("unknown comparison period '{0}'")]
    UnknownComparisonPeriod(String),
}

impl TryFrom<RawMetricSnapshot> for MetricSnapshot {
    type Error = SnapshotRejection;

    fn try_from(raw: RawMetricSnapshot) -> Result<Self, Self::Error> {
        let property_id = raw.property_id.trim();
        if property_id.is_empty() {
            return Err(SnapshotRejection::MissingPropertyId);
        }

        let metric_type = MetricType::from_code(&raw.metric_type)
            .ok_or_else(|| SnapshotRejection::UnknownMetricType(raw.metric_type.clone()))?;
        let comparison_period = ComparisonPeriod::from_code(&raw.comparison_period).ok_or_else(
            || SnapshotRejection::UnknownComparisonPeriod(raw.comparison_period.clone()),
        )?;

        Ok(MetricSnapshot {
            property_id: PropertyId::new(property_id),
            property_name: raw.property_name.unwrap_or_default(),
            metric_type,
            property_value: raw.property_value,
            portfolio_average: raw.portfolio_average,
            peer_group_average: raw.peer_group_average,
            comparison_period,
        })
    }
}

impl From<&MetricSnapshot> for RawMetricSnapshot {
    fn from(snapshot: &MetricSnapshot) -> Self {
        Self {
            property_id: snapshot.property_id.0.clone(),
            property_name: Some(snapshot.property_name.clone()).filter(|name| !name.is_empty()),
            metric_type: snapshot.metric_type.code().to_string(),
            property_value: snapshot.property_value,
            portfolio_average: snapshot.portfolio_average,
            peer_group_average: snapshot.peer_group_average,
            comparison_period: snapshot.comparison_period.code().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotImportError {
    #[error("failed to read snapshot export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid snapshot JSON data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Accepted snapshot export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Csv,
}

impl SnapshotFormat {
    /// Guess the format from the file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// A record from an export that could not be read as a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedSnapshot {
    /// 1-based position of the record within its export.
    pub record: usize,
    pub reason: String,
}

/// Snapshots read from one export, with the records that failed to deserialize.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotBatch {
    pub snapshots: Vec<RawMetricSnapshot>,
    pub malformed: Vec<MalformedSnapshot>,
}

impl SnapshotBatch {
    /// Deserialize each JSON element on its own so one bad record does not sink the rest.
    pub fn from_json_values(values: Vec<serde_json::Value>) -> Self {
        let mut batch = Self::default();
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<RawMetricSnapshot>(value) {
                Ok(snapshot) => batch.snapshots.push(snapshot),
                Err(err) => batch.push_malformed(index + 1, err.to_string()),
            }
        }
        batch
    }

    fn push_malformed(&mut self, record: usize, reason: String) {
        self.malformed.push(MalformedSnapshot { record, reason });
    }
}

impl From<Vec<RawMetricSnapshot>> for SnapshotBatch {
    fn from(snapshots: Vec<RawMetricSnapshot>) -> Self {
        Self {
            snapshots,
            malformed: Vec::new(),
        }
    }
}

pub struct SnapshotImporter;

impl SnapshotImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<SnapshotBatch, SnapshotImportError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, SnapshotFormat::from_path(path))
    }

    /// Read an export. Only an unreadable document is an error; bad records land in
    /// [`SnapshotBatch::malformed`].
    pub fn from_reader<R: Read>(
        reader: R,
        format: SnapshotFormat,
    ) -> Result<SnapshotBatch, SnapshotImportError> {
        match format {
            SnapshotFormat::Json => {
                let values: Vec<serde_json::Value> = serde_json::from_reader(reader)?;
                Ok(SnapshotBatch::from_json_values(values))
            }
            SnapshotFormat::Csv => parse_csv(reader),
        }
    }
}

fn parse_csv<R: Read>(reader: R) -> Result<SnapshotBatch, SnapshotImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut batch = SnapshotBatch::default();

    for (index, row) in csv_reader.records().enumerate() {
        let record = match row {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                batch.push_malformed(index + 1, err.to_string());
                continue;
            }
        };
        match record.deserialize::<CsvSnapshotRow>(Some(&headers)) {
            Ok(row) => batch.snapshots.push(row.into()),
            Err(err) => batch.push_malformed(index + 1, err.to_string()),
        }
    }

    Ok(batch)
}

#[derive(Debug, Deserialize)]
struct CsvSnapshotRow {
    property_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    property_name: Option<String>,
    metric_type: String,
    property_value: f64,
    portfolio_average: f64,
    #[serde(default, deserialize_with = "blank_cell_as_none")]
    peer_group_average: Option<f64>,
    comparison_period: String,
}

impl From<CsvSnapshotRow> for RawMetricSnapshot {
    fn from(row: CsvSnapshotRow) -> Self {
        Self {
            property_id: row.property_id,
            property_name: row.property_name,
            metric_type: row.metric_type,
            property_value: row.property_value,
            portfolio_average: row.portfolio_average,
            peer_group_average: row.peer_group_average,
            comparison_period: row.comparison_period,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Blank numeric cells mean "no value"; anything else must parse.
fn blank_cell_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match empty_string_as_none(deserializer)? {
        None => Ok(None),
        Some(cell) => cell.trim().parse::<f64>().map(Some).map_err(|_| {
            serde::de::Error::custom(format!("peer_group_average '{cell}' is not a number"))
        }),
    }
}

/// External source of snapshots for scheduled passes.
pub trait SnapshotProvider: Send + Sync {
    fn fetch(&self) -> Result<SnapshotBatch, SnapshotImportError>;
}

/// Provider that re-reads an exported JSON or CSV file on every pass.
#[derive(Debug, Clone)]
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotProvider for FileSnapshotProvider {
    fn fetch(&self) -> Result<SnapshotBatch, SnapshotImportError> {
        SnapshotImporter::from_path(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CSV_EXPORT: &str = "property_id,property_name,metric_type,property_value,portfolio_average,peer_group_average,comparison_period\n\
prop-a,Dune House,occupancy,40,60,,30d\n\
prop-b,Harbor Loft,pricing,115,100,108.5,7d\n";

    #[test]
    fn csv_rows_become_raw_snapshots() {
        let batch = SnapshotImporter::from_reader(Cursor::new(CSV_EXPORT), SnapshotFormat::Csv)
            .expect("csv parses");
        let snapshots = &batch.snapshots;

        assert!(batch.malformed.is_empty());
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].property_id, "prop-a");
        assert_eq!(snapshots[0].peer_group_average, None);
        assert_eq!(snapshots[1].peer_group_average, Some(108.5));
        assert_eq!(snapshots[1].property_name.as_deref(), Some("Harbor Loft"));
    }

    #[test]
    fn json_array_parses() {
        let json = r#"[{"property_id":"prop-c","metric_type":"onboarding","property_value":20,"portfolio_average":80,"peer_group_average":60,"comparison_period":"14d"}]"#;
        let batch = SnapshotImporter::from_reader(Cursor::new(json), SnapshotFormat::Json)
            .expect("json parses");
        assert_eq!(batch.snapshots.len(), 1);
        assert_eq!(batch.snapshots[0].property_name, None);
    }

    #[test]
    fn non_numeric_peer_average_is_not_read_as_missing() {
        let csv = format!("{CSV_EXPORT}prop-c,Cedar,onboarding,50,52,n/a,30d\n");
        let batch = SnapshotImporter::from_reader(Cursor::new(csv), SnapshotFormat::Csv)
            .expect("document parses");

        assert_eq!(batch.snapshots.len(), 2);
        assert!(batch
            .snapshots
            .iter()
            .all(|snapshot| snapshot.property_id != "prop-c"));
        assert_eq!(batch.malformed.len(), 1);
        assert_eq!(batch.malformed[0].record, 3);
        assert!(batch.malformed[0].reason.contains("n/a"));
    }

    #[test]
    fn bad_csv_rows_do_not_drop_good_ones() {
        let csv = format!(
            "{CSV_EXPORT}prop-d,Elm,occupancy,lots,60,,30d\nprop-e,Fir,occupancy,45\nprop-f,Gum,pricing,90,100,,14d\n"
        );
        let batch = SnapshotImporter::from_reader(Cursor::new(csv), SnapshotFormat::Csv)
            .expect("document parses");

        let ids: Vec<&str> = batch
            .snapshots
            .iter()
            .map(|snapshot| snapshot.property_id.as_str())
            .collect();
        assert_eq!(ids, vec!["prop-a", "prop-b", "prop-f"]);
        let positions: Vec<usize> = batch.malformed.iter().map(|bad| bad.record).collect();
        assert_eq!(positions, vec![3, 4]);
    }

    #[test]
    fn bad_json_records_do_not_drop_good_ones() {
        let json = r#"[
            {"property_id":"prop-a","metric_type":"occupancy","property_value":40,"portfolio_average":60,"comparison_period":"30d"},
            {"property_id":"prop-b","metric_type":"occupancy","property_value":null,"portfolio_average":60,"comparison_period":"30d"},
            {"property_id":"prop-c","metric_type":"pricing","property_value":120,"portfolio_average":100,"peer_group_average":"n/a","comparison_period":"7d"}
        ]"#;
        let batch = SnapshotImporter::from_reader(Cursor::new(json), SnapshotFormat::Json)
            .expect("document parses");

        assert_eq!(batch.snapshots.len(), 1);
        assert_eq!(batch.snapshots[0].property_id, "prop-a");
        let positions: Vec<usize> = batch.malformed.iter().map(|bad| bad.record).collect();
        assert_eq!(positions, vec![2, 3]);
    }

    #[test]
    fn unreadable_json_document_is_an_error() {
        let result = SnapshotImporter::from_reader(
            Cursor::new(r#"{"property_id":"prop-a"}"#),
            SnapshotFormat::Json,
        );
        assert!(matches!(result, Err(SnapshotImportError::Json(_))));
    }

    #[test]
    fn conversion_rejects_unknown_enum_values() {
        let mut raw = RawMetricSnapshot {
            property_id: "prop-a".to_string(),
            property_name: None,
            metric_type: "revenue".to_string(),
            property_value: 1.0,
            portfolio_average: 1.0,
            peer_group_average: None,
            comparison_period: "30d".to_string(),
        };
        assert_eq!(
            MetricSnapshot::try_from(raw.clone()),
            Err(SnapshotRejection::UnknownMetricType("revenue".to_string()))
        );

        raw.metric_type = "occupancy".to_string();
        raw.comparison_period = "90d".to_string();
        assert_eq!(
            MetricSnapshot::try_from(raw.clone()),
            Err(SnapshotRejection::UnknownComparisonPeriod("90d".to_string()))
        );

        raw.comparison_period = "7d".to_string();
        raw.property_id = "  ".to_string();
        assert_eq!(
            MetricSnapshot::try_from(raw),
            Err(SnapshotRejection::MissingPropertyId)
        );
    }

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(
            SnapshotFormat::from_path(Path::new("exports/snapshots.CSV")),
            SnapshotFormat::Csv
        );
        assert_eq!(
            SnapshotFormat::from_path(Path::new("exports/snapshots.json")),
            SnapshotFormat::Json
        );
    }
}
