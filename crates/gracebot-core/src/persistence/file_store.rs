use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::File,
    io::AsyncWriteExt,
    sync::{Mutex, RwLock},
};

use crate::{
    errors::Error,
    persistence::{
        store::{ActivityStore, Committed, ModelPredicate, Records},
        ActivityModel,
    },
    Result,
};

/// Activity history in a JSON-lines file, one `ActivityModel` per line.
///
/// A commit writes the stored records plus the new batch to a sibling temp
/// file, syncs it and renames it over the store file. Only then is the batch
/// published to readers. A failed write leaves the file and the in-memory
/// view as they were.
pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<Records>,
    writer: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or create on first commit) the store at `path`, loading existing records.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::Config("activity store path is empty".to_string()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let records = load_records(&path).await?;
        tracing::info!(path = %path.display(), records = records.len(), "opened activity store");

        Ok(Self {
            path,
            records: RwLock::new(records),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn replace_contents(&self, buf: &[u8]) -> std::io::Result<()> {
        let tmp = self.temp_path();
        let written = async {
            let mut file = File::create(&tmp).await?;
            file.write_all(buf).await?;
            file.sync_data().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if written.is_err() {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
                }
            }
        }
        written
    }
}

async fn load_records(path: &Path) -> Result<Records> {
    let mut records = Records::default();
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
        Err(e) => {
            return Err(Error::Storage(format!(
                "cannot read activity store {}: {e}",
                path.display()
            )))
        }
    };

    // An unterminated last line is a write that never finished.
    let torn_tail = !txt.is_empty() && !txt.ends_with('\n');
    let lines: Vec<&str> = txt.lines().collect();
    let last = lines.len().saturating_sub(1);

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let model: ActivityModel = match serde_json::from_str(line) {
            Ok(model) => model,
            Err(e) if torn_tail && idx == last => {
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "dropping unterminated record"
                );
                break;
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "corrupt record at {}:{}: {e}",
                    path.display(),
                    idx + 1
                )))
            }
        };
        let batch = vec![model];
        records.check_batch(&batch)?;
        records.extend(batch);
    }

    Ok(records)
}

#[async_trait]
impl ActivityStore for JsonFileStore {
    async fn commit(&self, staged: Vec<ActivityModel>) -> Result<Committed> {
        let _writer = self.writer.lock().await;

        self.records.read().await.check_batch(&staged)?;

        let mut buf = Vec::new();
        for m in self.records.read().await.iter().chain(&staged) {
            serde_json::to_writer(&mut buf, m)?;
            buf.push(b'\n');
        }

        self.replace_contents(&buf).await.map_err(|e| {
            Error::Storage(format!(
                "commit to {} failed: {e}",
                self.path.display()
            ))
        })?;

        let n = staged.len();
        let mut records = self.records.write().await;
        records.extend(staged);
        Ok(Committed {
            records: n,
            total: records.len(),
        })
    }

    async fn find_first(&self, predicate: ModelPredicate<'_>) -> Result<Option<ActivityModel>> {
        Ok(self.records.read().await.find_first(predicate))
    }

    async fn find_all(&self, predicate: ModelPredicate<'_>) -> Result<Vec<ActivityModel>> {
        Ok(self.records.read().await.find_all(predicate))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        PathBuf::from(format!("/tmp/{prefix}-{}-{ts}", std::process::id()))
    }

    fn model(id: &str) -> ActivityModel {
        ActivityModel {
            id: id.to_string(),
            activity_type: "message".to_string(),
            timestamp: "2024-05-01T10:00:00.000000000+02:00".to_string(),
            text: Some(format!("text of {id}\nwith a newline")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tmp("gracebot-store");
        let path = dir.join("activities.jsonl");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.commit(vec![model("a"), model("b")]).await.unwrap();
        store.commit(vec![model("c")]).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 3);
        let b = reopened
            .find_first(&|m: &ActivityModel| m.id == "b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b, model("b"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_without_writing() {
        let dir = tmp("gracebot-store-dup");
        let path = dir.join("activities.jsonl");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.commit(vec![model("a")]).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = store.commit(vec![model("b"), model("a")]).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateActivity(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(store.len().await.unwrap(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failed_commit_is_a_storage_error_and_stays_invisible() {
        let dir = tmp("gracebot-store-fail");
        let path = dir.join("activities.jsonl");

        let store = JsonFileStore::open(&path).await.unwrap();
        // A directory where the file should be makes the rename fail.
        std::fs::create_dir_all(&path).unwrap();

        let err = store.commit(vec![model("a")]).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "got {err:?}");
        assert!(store
            .find_first(&|m: &ActivityModel| m.id == "a")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.len().await.unwrap(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unterminated_last_line_is_dropped_on_open() {
        let dir = tmp("gracebot-store-torn");
        let path = dir.join("activities.jsonl");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.commit(vec![model("a")]).await.unwrap();
        drop(store);

        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("{\"id\":\"b\",\"activity_ty");
        std::fs::write(&path, raw).unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
        let a = reopened
            .find_first(&|m: &ActivityModel| m.id == "a")
            .await
            .unwrap();
        assert_eq!(a, Some(model("a")));

        // The next commit rewrites the file without the fragment.
        reopened.commit(vec![model("b")]).await.unwrap();
        drop(reopened);
        let again = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(again.len().await.unwrap(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn commit_leaves_no_temp_file() {
        let dir = tmp("gracebot-store-tmp");
        let path = dir.join("activities.jsonl");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.commit(vec![model("a")]).await.unwrap();
        store.commit(vec![model("b")]).await.unwrap();

        assert!(!store.temp_path().exists());
        let lines = std::fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn corrupt_lines_fail_to_open() {
        let dir = tmp("gracebot-store-corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("activities.jsonl");
        std::fs::write(&path, "{\"id\":\"a\"}\nnot json\n").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path).await,
            Err(Error::Storage(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
