#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Barrier;
use url::Url;

use visiongate::config::SecurityConfig;
use visiongate::db::AccountsStorage;
use visiongate::service::{
    AccountService, ImageClassifier, ImageFetcher, PasswordHashing, Prediction,
};
use visiongate::GateError;

pub const ADMIN_KEY: &str = "test-admin-secret";

/// SQLite file under the temp dir, removed on drop.
pub struct TempDb {
    pub storage: AccountsStorage,
    path: PathBuf,
}

impl TempDb {
    pub async fn new(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "visiongate-{tag}-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));
        let database_url = format!("sqlite:{}", path.display());
        let storage = AccountsStorage::connect(&database_url)
            .await
            .expect("failed to open test database");
        Self { storage, path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(self.path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(self.path.with_extension("sqlite-shm"));
    }
}

pub fn fast_hasher() -> PasswordHashing {
    PasswordHashing::new(&SecurityConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("valid argon2 params")
}

pub fn png_bytes() -> Bytes {
    let img = RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("png encode");
    Bytes::from(buf.into_inner())
}

pub enum FetchBehavior {
    Image,
    Fail,
}

pub struct FakeFetcher {
    pub calls: AtomicUsize,
    behavior: FetchBehavior,
}

impl FakeFetcher {
    pub fn new(behavior: FetchBehavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            FetchBehavior::Image => Ok(png_bytes()),
            FetchBehavior::Fail => Err(GateError::FetchFailed(format!("unreachable: {url}"))),
        }
    }
}

pub enum InferBehavior {
    Labels,
    Fail,
    /// Succeed after every concurrent caller has reached the model.
    LabelsAfterBarrier(Arc<Barrier>),
}

pub struct FakeClassifier {
    pub calls: AtomicUsize,
    behavior: InferBehavior,
}

impl FakeClassifier {
    pub fn new(behavior: InferBehavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn sample_predictions() -> Vec<Prediction> {
    [
        ("tabby", 61.5),
        ("tiger_cat", 20.25),
        ("Egyptian_cat", 9.0),
        ("lynx", 3.5),
        ("Persian_cat", 1.75),
    ]
    .into_iter()
    .map(|(label, confidence)| Prediction {
        label: label.to_string(),
        confidence,
    })
    .collect()
}

#[async_trait]
impl ImageClassifier for FakeClassifier {
    async fn classify(&self, _image: Bytes) -> Result<Vec<Prediction>, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            InferBehavior::Labels => Ok(sample_predictions()),
            InferBehavior::Fail => Err(GateError::InferenceFailed(
                "unsupported channel count".to_string(),
            )),
            InferBehavior::LabelsAfterBarrier(barrier) => {
                barrier.wait().await;
                Ok(sample_predictions())
            }
        }
    }
}

pub fn service(
    db: &TempDb,
    fetcher: Arc<impl ImageFetcher + 'static>,
    classifier: Arc<FakeClassifier>,
) -> AccountService {
    AccountService::new(
        Arc::new(db.storage.clone()),
        fast_hasher(),
        fetcher,
        classifier,
        ADMIN_KEY,
    )
}
