//! Appending metric records to CSV logs.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::{metrics::MetricRecord, participant::DataSet};

/// The leading columns of every log.
const COLUMNS: [&str; 5] = ["client_id", "round_number", "hierarchy", "num_samples", "set"];

/// Errors which can occur when writing a log.
#[derive(Debug, Error)]
#[error("failed to write metrics to `{}`: {}", .path.display(), .source)]
pub struct MetricsError {
    path: PathBuf,
    source: io::Error,
}

/// A writer of the statistical and the system metrics logs.
///
/// The logs are `<dir>/<name>_stat.csv` and `<dir>/<name>_sys.csv`. Both are appended to, the
/// header is written when a log is created and fixes the metric columns of the log. The
/// statistical log starts over with the evaluation of round `0`.
#[derive(Debug, Clone)]
pub struct MetricsWriter {
    stat_path: PathBuf,
    sys_path: PathBuf,
}

impl MetricsWriter {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            stat_path: dir.join(format!("{}_stat.csv", name)),
            sys_path: dir.join(format!("{}_sys.csv", name)),
        }
    }

    pub fn stat_path(&self) -> &Path {
        &self.stat_path
    }

    pub fn sys_path(&self) -> &Path {
        &self.sys_path
    }

    /// Appends evaluation metrics.
    pub async fn write_stat(
        &self,
        round: u64,
        set: DataSet,
        record: &MetricRecord,
        groups: &BTreeMap<String, String>,
    ) -> Result<(), MetricsError> {
        append(&self.stat_path, round == 0, round, set, record, groups).await
    }

    /// Appends training system metrics.
    pub async fn write_sys(
        &self,
        round: u64,
        record: &MetricRecord,
        groups: &BTreeMap<String, String>,
    ) -> Result<(), MetricsError> {
        append(&self.sys_path, false, round, DataSet::Train, record, groups).await
    }
}

async fn append(
    path: &Path,
    truncate: bool,
    round: u64,
    set: DataSet,
    record: &MetricRecord,
    groups: &BTreeMap<String, String>,
) -> Result<(), MetricsError> {
    let error = |source| MetricsError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await.map_err(error)?;
    }
    let header = if truncate {
        None
    } else {
        read_header(path).await.map_err(error)?
    };

    let mut csv = String::new();
    let names: Vec<String> = match header {
        Some(names) => names,
        None => {
            let names: Vec<String> = record
                .metric_names()
                .into_iter()
                .map(ToString::to_string)
                .collect();
            let header: Vec<&str> = COLUMNS
                .iter()
                .copied()
                .chain(names.iter().map(String::as_str))
                .collect();
            csv.push_str(&header.join(","));
            csv.push('\n');
            names
        }
    };
    for name in record.metric_names() {
        if !names.iter().any(|column| column == name) {
            warn!("{} has no column `{}`, dropping it", path.display(), name);
        }
    }

    for (id, weight, metrics) in record.iter() {
        let mut row = vec![
            escape(id),
            round.to_string().into(),
            escape(groups.get(id).map_or("", String::as_str)),
            weight.to_string().into(),
            set.to_string().into(),
        ];
        row.extend(names.iter().map(|name| {
            metrics
                .get(name.as_str())
                .map_or_else(String::new, ToString::to_string)
                .into()
        }));
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    let mut options = fs::OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let mut file = options.open(path).await.map_err(error)?;
    file.write_all(csv.as_bytes()).await.map_err(error)?;
    file.flush().await.map_err(error)?;
    debug!("wrote {} rows to {}", record.len(), path.display());
    Ok(())
}

/// Reads the metric columns from the header of an existing log.
///
/// Returns `None` if the log doesn't exist or is empty.
async fn read_header(path: &Path) -> io::Result<Option<Vec<String>>> {
    let file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let mut header = String::new();
    if BufReader::new(file).read_line(&mut header).await? == 0 {
        return Ok(None);
    }
    let names = header
        .trim_end()
        .split(',')
        .skip(COLUMNS.len())
        .map(ToString::to_string)
        .collect();
    Ok(Some(names))
}

/// Quotes a field if necessary.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains(|c: char| c == ',' || c == '"' || c == '\n') {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::model::MetricValues;

    fn metrics(values: &[(&str, f64)]) -> MetricValues {
        values
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    #[tokio::test]
    async fn test_append_stat_metrics() {
        let dir = TempDir::new().unwrap();
        let writer = MetricsWriter::new(dir.path().join("metrics"), "run");
        let groups: BTreeMap<String, String> = vec![("b".to_string(), "king, lear".to_string())]
            .into_iter()
            .collect();

        let mut record = MetricRecord::new();
        record.insert("b", 5., metrics(&[("loss", 0.5), ("accuracy", 0.6)]));
        record.insert("a", 10., metrics(&[("accuracy", 0.8)]));
        writer
            .write_stat(0, DataSet::Test, &record, &groups)
            .await
            .unwrap();

        let mut record = MetricRecord::new();
        record.insert("a", 10., metrics(&[("accuracy", 0.9), ("loss", 0.1)]));
        writer
            .write_stat(3, DataSet::Test, &record, &groups)
            .await
            .unwrap();

        let csv = std::fs::read_to_string(writer.stat_path()).unwrap();
        assert_eq!(
            csv,
            "client_id,round_number,hierarchy,num_samples,set,accuracy,loss\n\
             a,0,,10,test,0.8,\n\
             b,0,\"king, lear\",5,test,0.6,0.5\n\
             a,3,,10,test,0.9,0.1\n"
        );
        assert!(!writer.sys_path().exists());
    }

    #[tokio::test]
    async fn test_sys_metrics_use_train_set() {
        let dir = TempDir::new().unwrap();
        let writer = MetricsWriter::new(dir.path(), "metrics");

        let mut record = MetricRecord::new();
        record.insert(
            "a",
            4.,
            metrics(&[("bytes_read", 80.), ("local_computations", 12.)]),
        );
        writer
            .write_sys(1, &record, &BTreeMap::new())
            .await
            .unwrap();

        let csv = std::fs::read_to_string(dir.path().join("metrics_sys.csv")).unwrap();
        assert_eq!(
            csv,
            "client_id,round_number,hierarchy,num_samples,set,bytes_read,local_computations\n\
             a,1,,4,train,80,12\n"
        );
    }

    #[tokio::test]
    async fn test_columns_are_fixed_by_the_header() {
        let dir = TempDir::new().unwrap();
        let writer = MetricsWriter::new(dir.path(), "metrics");
        let groups = BTreeMap::new();

        let mut record = MetricRecord::new();
        record.insert("a", 1., metrics(&[("accuracy", 0.5)]));
        writer
            .write_stat(0, DataSet::Test, &record, &groups)
            .await
            .unwrap();

        let mut record = MetricRecord::new();
        record.insert("a", 1., metrics(&[("loss", 0.2), ("accuracy", 0.7)]));
        writer
            .write_stat(1, DataSet::Test, &record, &groups)
            .await
            .unwrap();

        let csv = std::fs::read_to_string(writer.stat_path()).unwrap();
        assert_eq!(
            csv,
            "client_id,round_number,hierarchy,num_samples,set,accuracy\n\
             a,0,,1,test,0.5\n\
             a,1,,1,test,0.7\n"
        );
        let counts: Vec<usize> = csv.lines().map(|line| line.split(',').count()).collect();
        assert!(counts.iter().all(|count| *count == counts[0]));
    }

    #[tokio::test]
    async fn test_stat_log_starts_over_at_round_zero() {
        let dir = TempDir::new().unwrap();
        let writer = MetricsWriter::new(dir.path(), "metrics");
        let groups = BTreeMap::new();

        let mut record = MetricRecord::new();
        record.insert("a", 1., metrics(&[("accuracy", 0.5)]));
        writer
            .write_stat(0, DataSet::Test, &record, &groups)
            .await
            .unwrap();
        writer
            .write_stat(3, DataSet::Test, &record, &groups)
            .await
            .unwrap();

        // a second run with another model
        let mut record = MetricRecord::new();
        record.insert("b", 2., metrics(&[("accuracy", 0.25), ("loss", 1.5)]));
        writer
            .write_stat(0, DataSet::Val, &record, &groups)
            .await
            .unwrap();

        let csv = std::fs::read_to_string(writer.stat_path()).unwrap();
        assert_eq!(
            csv,
            "client_id,round_number,hierarchy,num_samples,set,accuracy,loss\n\
             b,0,,2,val,0.25,1.5\n"
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
