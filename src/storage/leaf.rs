//! Loading of LEAF-style data partitions.
//!
//! A data directory contains any number of `*.json` files of the form
//!
//! ```json
//! {
//!     "users": ["f_0001", "f_0002"],
//!     "hierarchies": ["writer_a", "writer_b"],
//!     "num_samples": [17, 4],
//!     "user_data": {
//!         "f_0001": { "x": [...], "y": [...] },
//!         "f_0002": { "x": [...], "y": [...] }
//!     }
//! }
//! ```
//!
//! where `hierarchies` is optional and `num_samples` is ignored.

use std::{
    collections::{BTreeMap, HashMap},
    io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::participant::{Participant, Partition};

/// Errors which can occur when loading partitions.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read `{}`: {}", .path.display(), .source)]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse `{}`: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("user `{0}` is missing either training or evaluation data")]
    MismatchedUsers(String),
}

#[derive(Debug, Deserialize)]
struct LeafFile {
    users: Vec<String>,
    #[serde(default)]
    hierarchies: Vec<Value>,
    user_data: HashMap<String, Partition>,
}

/// The merged contents of a data directory.
#[derive(Debug, Default)]
struct LeafData {
    groups: HashMap<String, String>,
    partitions: BTreeMap<String, Partition>,
}

/// Loads the participants from a training and an evaluation data directory.
///
/// Both directories must contain the same users. The participants are sorted by their id.
///
/// # Errors
/// Fails if a file can't be read or parsed, or if the users of both directories differ.
pub async fn load_participants(
    train_dir: impl AsRef<Path>,
    eval_dir: impl AsRef<Path>,
) -> Result<Vec<Participant>, DataError> {
    let LeafData {
        mut groups,
        partitions: train,
    } = read_dir(train_dir.as_ref()).await?;
    let LeafData {
        partitions: mut eval,
        ..
    } = read_dir(eval_dir.as_ref()).await?;

    if let Some(user) = eval.keys().find(|user| !train.contains_key(*user)) {
        return Err(DataError::MismatchedUsers(user.clone()));
    }

    let participants = train
        .into_iter()
        .map(|(id, train)| {
            let eval = eval
                .remove(&id)
                .ok_or_else(|| DataError::MismatchedUsers(id.clone()))?;
            let group = groups.remove(&id);
            Ok(Participant::new(id, group, train, eval))
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    info!("loaded {} participants", participants.len());
    Ok(participants)
}

async fn read_dir(dir: &Path) -> Result<LeafData, DataError> {
    let io_error = |source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(io_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut data = LeafData::default();
    for path in paths {
        debug!("reading {}", path.display());
        let bytes = fs::read(&path).await.map_err(|source| DataError::Io {
            path: path.clone(),
            source,
        })?;
        let file: LeafFile =
            serde_json::from_slice(&bytes).map_err(|source| DataError::Parse { path, source })?;

        for (user, group) in file.users.iter().zip(file.hierarchies) {
            let group = match group {
                Value::String(group) => group,
                group => group.to_string(),
            };
            data.groups.insert(user.clone(), group);
        }
        data.partitions.extend(file.user_data);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn write_json(dir: &Path, name: &str, value: Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn user_data(len: usize) -> Value {
        json!({
            "x": (0..len).map(|i| vec![i as f64; 2]).collect::<Vec<_>>(),
            "y": (0..len).map(|i| i % 2).collect::<Vec<_>>(),
        })
    }

    fn data_dirs() -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().unwrap();
        let train = root.path().join("train");
        let test = root.path().join("test");
        fs::create_dir_all(&train).unwrap();
        fs::create_dir_all(&test).unwrap();
        (root, train, test)
    }

    #[tokio::test]
    async fn test_load_participants() {
        let (_root, train, test) = data_dirs();
        write_json(
            &train,
            "all_data_1.json",
            json!({
                "users": ["u2", "u1"],
                "hierarchies": ["hamlet", 7],
                "num_samples": [3, 5],
                "user_data": { "u1": user_data(5), "u2": user_data(3) },
            }),
        );
        write_json(
            &train,
            "all_data_0.json",
            json!({ "users": ["u0"], "user_data": { "u0": user_data(4) } }),
        );
        fs::write(train.join("README.md"), "not data").unwrap();
        write_json(
            &test,
            "all_data.json",
            json!({
                "users": ["u0", "u1", "u2"],
                "user_data": { "u0": user_data(1), "u1": user_data(2), "u2": user_data(1) },
            }),
        );

        let participants = load_participants(&train, &test).await.unwrap();
        let ids: Vec<&str> = participants.iter().map(Participant::id).collect();
        assert_eq!(ids, ["u0", "u1", "u2"]);

        assert_eq!(participants[0].group(), None);
        assert_eq!(participants[1].group(), Some("7"));
        assert_eq!(participants[2].group(), Some("hamlet"));
        assert_eq!(participants[1].num_train_samples(), 5);
        assert_eq!(participants[1].num_eval_samples(), 2);
        assert_eq!(participants[1].num_samples(), 7);
    }

    #[tokio::test]
    async fn test_mismatched_users() {
        let (_root, train, test) = data_dirs();
        write_json(
            &train,
            "data.json",
            json!({ "users": ["u0"], "user_data": { "u0": user_data(2) } }),
        );
        write_json(
            &test,
            "data.json",
            json!({ "users": ["u1"], "user_data": { "u1": user_data(2) } }),
        );

        match load_participants(&train, &test).await {
            Err(DataError::MismatchedUsers(user)) => assert_eq!(user, "u1"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let (_root, train, test) = data_dirs();
        fs::write(train.join("data.json"), "{ \"users\": ").unwrap();

        assert!(matches!(
            load_participants(&train, &test).await,
            Err(DataError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let (root, train, _) = data_dirs();
        assert!(matches!(
            load_participants(&train, root.path().join("val")).await,
            Err(DataError::Io { .. })
        ));
    }
}
