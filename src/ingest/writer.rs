// src/ingest/writer.rs
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// What to do when the attempt's output file already exists.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Create `<stem>_1.<ext>`, `<stem>_2.<ext>`, ...
    #[default]
    Disambiguate,
    Truncate,
    Append,
    /// Return `AlreadyExists`.
    Fail,
}

/// Append-only writer for one ingestion attempt.
pub struct RecordWriter {
    out: BufWriter<File>,
    path: PathBuf,
}

impl RecordWriter {
    pub async fn create(dir: &Path, file_name: &str, policy: CollisionPolicy) -> io::Result<Self> {
        let path = dir.join(file_name);
        let (file, path) = match policy {
            CollisionPolicy::Truncate => {
                let f = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)
                    .await?;
                (f, path)
            }
            CollisionPolicy::Append => {
                let f = OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(&path)
                    .await?;
                (f, path)
            }
            CollisionPolicy::Fail => (create_new(&path).await?, path),
            CollisionPolicy::Disambiguate => create_disambiguated(&path).await?,
        };
        Ok(Self {
            out: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one formatted record and flush it so readers see it immediately.
    pub async fn write_record(&mut self, record: &str) -> io::Result<()> {
        self.out.write_all(record.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    pub async fn finish(mut self) -> io::Result<PathBuf> {
        self.out.flush().await?;
        self.out.get_mut().sync_data().await?;
        Ok(self.path)
    }
}

async fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

async fn create_disambiguated(path: &Path) -> io::Result<(File, PathBuf)> {
    match create_new(path).await {
        Ok(f) => return Ok((f, path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }
    for n in 1..=u32::MAX {
        let candidate = suffixed(path, n);
        match create_new(&candidate).await {
            Ok(f) => return Ok((f, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {}", path.display()),
    ))
}

fn suffixed(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "red_line_predict_20240301_091530.txt";

    async fn write_one(dir: &Path, policy: CollisionPolicy, rec: &str) -> io::Result<PathBuf> {
        let mut w = RecordWriter::create(dir, NAME, policy).await?;
        w.write_record(rec).await?;
        w.finish().await
    }

    #[tokio::test]
    async fn truncate_overwrites_same_name() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_one(tmp.path(), CollisionPolicy::Truncate, "first\n").await.unwrap();
        let b = write_one(tmp.path(), CollisionPolicy::Truncate, "second\n").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "second\n");
    }

    #[tokio::test]
    async fn append_keeps_earlier_records() {
        let tmp = tempfile::tempdir().unwrap();
        write_one(tmp.path(), CollisionPolicy::Append, "first\n").await.unwrap();
        let p = write_one(tmp.path(), CollisionPolicy::Append, "second\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(p).unwrap(), "first\nsecond\n");
    }

    #[tokio::test]
    async fn fail_reports_already_exists() {
        let tmp = tempfile::tempdir().unwrap();
        write_one(tmp.path(), CollisionPolicy::Fail, "first\n").await.unwrap();
        let err = write_one(tmp.path(), CollisionPolicy::Fail, "second\n")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn disambiguate_adds_counter_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_one(tmp.path(), CollisionPolicy::Disambiguate, "a\n").await.unwrap();
        let b = write_one(tmp.path(), CollisionPolicy::Disambiguate, "b\n").await.unwrap();
        let c = write_one(tmp.path(), CollisionPolicy::Disambiguate, "c\n").await.unwrap();
        assert_eq!(a.file_name().unwrap(), NAME);
        assert_eq!(b.file_name().unwrap(), "red_line_predict_20240301_091530_1.txt");
        assert_eq!(c.file_name().unwrap(), "red_line_predict_20240301_091530_2.txt");
        assert_eq!(std::fs::read_to_string(a).unwrap(), "a\n");
    }

    #[tokio::test]
    async fn disambiguate_keeps_counting_past_a_thousand() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(NAME), "").unwrap();
        for n in 1..=1000 {
            std::fs::write(suffixed(&tmp.path().join(NAME), n), "").unwrap();
        }
        let p = write_one(tmp.path(), CollisionPolicy::Disambiguate, "late\n")
            .await
            .unwrap();
        assert_eq!(
            p.file_name().unwrap(),
            "red_line_predict_20240301_091530_1001.txt"
        );
        assert_eq!(std::fs::read_to_string(p).unwrap(), "late\n");
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err = RecordWriter::create(&missing, NAME, CollisionPolicy::Truncate)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
