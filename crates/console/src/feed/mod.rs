//! Patient post feed.
//!
//! A post is created locally, prepended to the feed with `analyzing` set,
//! and then submitted for risk analysis. When the verdict arrives it is
//! attached to the post that started it (matched by [`PostId`]). A failed
//! analysis clears `analyzing` and leaves the post without a verdict; the
//! failure is logged and never blocks the next submission.

mod simulator;

pub use simulator::{SAMPLE_POSTS, SIMULATION_INTERVAL, SimulationHandle, start_simulation};

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mindwatch_core::{AnalysisResult, PostId, Session, UserId};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, ApiError, ImageUpload};

/// Errors that reject a submission before any request is sent.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Neither text nor an image was given.
    #[error("Nothing to submit: message is empty and no image is attached")]
    Empty,

    /// The image file could not be read.
    #[error("Cannot read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read an image file for upload.
///
/// # Errors
///
/// Returns [`SubmitError::Image`] if the file cannot be read.
pub async fn load_image(path: &Path) -> Result<ImageUpload, SubmitError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| SubmitError::Image {
            path: path.display().to_string(),
            source,
        })?;
    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(ImageUpload::new(file_name, bytes))
}

/// A locally created feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub image_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub analyzing: bool,
    pub result: Option<AnalysisResult>,
    pub simulated: bool,
}

/// Sends content for risk analysis.
pub trait Analyzer: Send + Sync + 'static {
    /// Analyse text.
    fn analyze_text(
        &self,
        message: &str,
    ) -> impl Future<Output = Result<AnalysisResult, ApiError>> + Send;

    /// Analyse an image with optional accompanying text.
    fn analyze_image(
        &self,
        image: &ImageUpload,
        message: Option<&str>,
    ) -> impl Future<Output = Result<AnalysisResult, ApiError>> + Send;
}

/// Analyses content on behalf of a logged-in user.
#[derive(Debug, Clone)]
pub struct SessionAnalyzer {
    api: ApiClient,
    session: Session,
}

impl SessionAnalyzer {
    #[must_use]
    pub const fn new(api: ApiClient, session: Session) -> Self {
        Self { api, session }
    }

    fn user_id(&self) -> &UserId {
        self.session.id()
    }
}

impl Analyzer for SessionAnalyzer {
    async fn analyze_text(&self, message: &str) -> Result<AnalysisResult, ApiError> {
        self.api
            .analyze(message, self.user_id(), Some(&self.session))
            .await
    }

    async fn analyze_image(
        &self,
        image: &ImageUpload,
        message: Option<&str>,
    ) -> Result<AnalysisResult, ApiError> {
        self.api
            .analyze_image(image, message, self.user_id(), Some(&self.session))
            .await
    }
}

/// Newest-first feed of posts. Clones share the same feed.
pub struct PostFeed<A> {
    analyzer: Arc<A>,
    posts: Arc<watch::Sender<Vec<Post>>>,
}

impl<A> Clone for PostFeed<A> {
    fn clone(&self) -> Self {
        Self {
            analyzer: Arc::clone(&self.analyzer),
            posts: Arc::clone(&self.posts),
        }
    }
}

impl<A: Analyzer> PostFeed<A> {
    /// Create an empty feed.
    #[must_use]
    pub fn new(analyzer: A) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            analyzer: Arc::new(analyzer),
            posts: Arc::new(tx),
        }
    }

    /// Copy of the posts, newest first.
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.posts.borrow().clone()
    }

    /// Receiver that observes every feed change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Post>> {
        self.posts.subscribe()
    }

    /// Post `message` (and optionally `image`) and wait for the verdict.
    ///
    /// The image, when present, goes to the image endpoint with the message
    /// as optional context. Returns the new post's ID whether or not the
    /// analysis succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Empty`] for a blank message with no image. No
    /// post is created in that case.
    pub async fn submit(
        &self,
        message: &str,
        image: Option<ImageUpload>,
    ) -> Result<PostId, SubmitError> {
        self.post(message, image, false).await
    }

    /// Post a sample message marked as simulated.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Empty`] for a blank message.
    pub async fn submit_simulated(&self, message: &str) -> Result<PostId, SubmitError> {
        self.post(message, None, true).await
    }

    #[instrument(skip(self, message, image), fields(has_image = image.is_some()))]
    async fn post(
        &self,
        message: &str,
        image: Option<ImageUpload>,
        simulated: bool,
    ) -> Result<PostId, SubmitError> {
        if message.trim().is_empty() && image.is_none() {
            return Err(SubmitError::Empty);
        }

        let id = PostId::generate();
        let post = Post {
            id,
            content: message.to_string(),
            image_name: image.as_ref().map(|i| i.file_name.clone()),
            timestamp: Utc::now(),
            analyzing: true,
            result: None,
            simulated,
        };
        self.posts.send_modify(|posts| posts.insert(0, post));

        let outcome = match &image {
            Some(image) => {
                let context = Some(message).filter(|m| !m.trim().is_empty());
                self.analyzer.analyze_image(image, context).await
            }
            None => self.analyzer.analyze_text(message).await,
        };

        let result = match outcome {
            Ok(result) => {
                info!(post_id = %id, level = %result.level, score = result.score, "Post analysed");
                Some(result)
            }
            Err(e) => {
                warn!(post_id = %id, error = %e, "Post analysis failed");
                None
            }
        };

        self.posts.send_modify(|posts| {
            if let Some(post) = posts.iter_mut().find(|p| p.id == id) {
                post.analyzing = false;
                post.result = result;
            }
        });
        Ok(id)
    }
}

impl<A> std::fmt::Debug for PostFeed<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostFeed")
            .field("posts", &self.posts.borrow().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mindwatch_core::{RiskLevel, RiskStatus};
    use tokio::sync::oneshot;

    use super::*;

    pub(crate) fn verdict(level: RiskLevel, score: f64) -> AnalysisResult {
        serde_json::from_value(serde_json::json!({
            "level": level.as_str(),
            "score": score,
            "reason": "test",
        }))
        .unwrap()
    }

    /// Records calls; fails text containing "fail".
    #[derive(Default)]
    pub(crate) struct FakeAnalyzer {
        pub text_calls: AtomicUsize,
        pub image_calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl Analyzer for FakeAnalyzer {
        async fn analyze_text(&self, message: &str) -> Result<AnalysisResult, ApiError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            if message.contains("fail") {
                return Err(ApiError::Api {
                    status: 500,
                    message: "model offline".to_string(),
                });
            }
            Ok(verdict(RiskLevel::Yellow, 5.0))
        }

        async fn analyze_image(
            &self,
            image: &ImageUpload,
            message: Option<&str>,
        ) -> Result<AnalysisResult, ApiError> {
            self.image_calls
                .lock()
                .unwrap()
                .push((image.file_name.clone(), message.map(str::to_string)));
            Ok(verdict(RiskLevel::Green, 1.0))
        }
    }

    /// Holds the verdict until released.
    struct GatedAnalyzer {
        gate: Mutex<Option<oneshot::Receiver<AnalysisResult>>>,
    }

    impl Analyzer for GatedAnalyzer {
        async fn analyze_text(&self, _message: &str) -> Result<AnalysisResult, ApiError> {
            let rx = self.gate.lock().unwrap().take().unwrap();
            rx.await.map_err(|e| ApiError::Decode(e.to_string()))
        }

        async fn analyze_image(
            &self,
            _image: &ImageUpload,
            _message: Option<&str>,
        ) -> Result<AnalysisResult, ApiError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_blank_message_without_image_is_rejected() {
        let feed = PostFeed::new(FakeAnalyzer::default());
        assert!(matches!(feed.submit("  \n\t", None).await, Err(SubmitError::Empty)));
        assert!(feed.posts().is_empty());
        assert_eq!(feed.analyzer.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_post_gets_verdict() {
        let feed = PostFeed::new(FakeAnalyzer::default());
        let id = feed.submit("ฟังเพลงนี้แล้วคิดถึงแฟนเก่า", None).await.unwrap();

        let posts = feed.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, id);
        assert!(!posts[0].analyzing);
        assert_eq!(
            posts[0].result.as_ref().unwrap().level,
            RiskStatus::Level(RiskLevel::Yellow)
        );
    }

    #[tokio::test]
    async fn test_analyzing_flag_flips_once() {
        let (tx, rx) = oneshot::channel();
        let feed = PostFeed::new(GatedAnalyzer {
            gate: Mutex::new(Some(rx)),
        });
        let mut changes = feed.subscribe();

        let task = tokio::spawn({
            let feed = feed.clone();
            async move { feed.submit("hello", None).await }
        });

        changes.changed().await.unwrap();
        let pending = changes.borrow_and_update().clone();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].analyzing);
        assert!(pending[0].result.is_none());

        tx.send(verdict(RiskLevel::Red, 9.0)).unwrap();
        task.await.unwrap().unwrap();

        changes.changed().await.unwrap();
        let done = changes.borrow_and_update().clone();
        assert!(!done[0].analyzing);
        assert!(done[0].result.is_some());
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_failure_clears_flag_without_result() {
        let feed = PostFeed::new(FakeAnalyzer::default());
        feed.submit("this will fail", None).await.unwrap();
        let posts = feed.posts();
        assert!(!posts[0].analyzing);
        assert!(posts[0].result.is_none());

        // The next post still goes through.
        feed.submit("fine", None).await.unwrap();
        assert!(feed.posts()[0].result.is_some());
    }

    #[tokio::test]
    async fn test_newest_first() {
        let feed = PostFeed::new(FakeAnalyzer::default());
        feed.submit("first", None).await.unwrap();
        feed.submit("second", None).await.unwrap();
        let contents: Vec<String> = feed.posts().into_iter().map(|p| p.content).collect();
        assert_eq!(contents, ["second", "first"]);
    }

    #[tokio::test]
    async fn test_image_takes_precedence() {
        let feed = PostFeed::new(FakeAnalyzer::default());
        let image = ImageUpload::new("selfie.jpg", vec![0xff, 0xd8]);
        feed.submit("caption", Some(image.clone())).await.unwrap();
        feed.submit("", Some(image)).await.unwrap();

        assert_eq!(feed.analyzer.text_calls.load(Ordering::SeqCst), 0);
        let calls = feed.analyzer.image_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("selfie.jpg".to_string(), Some("caption".to_string())),
                ("selfie.jpg".to_string(), None),
            ]
        );
        assert_eq!(feed.posts()[0].image_name.as_deref(), Some("selfie.jpg"));
    }

    #[tokio::test]
    async fn test_load_image_missing_file() {
        let err = load_image(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Image { .. }));
    }

    #[tokio::test]
    async fn test_load_image_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let upload = load_image(&path).await.unwrap();
        assert_eq!(upload.file_name, "pic.png");
        assert_eq!(upload.bytes, vec![1, 2, 3]);
    }
}
