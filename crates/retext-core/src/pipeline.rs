//! One transformation run: validate, compose, call the gateway, record the result.

use std::fmt;

use crate::composer::compose;
use crate::history::VersionHistory;
use crate::providers::{GatewayError, GatewayErrorKind, ModelGateway};
use crate::transforms::{DEFAULT_MAX_TRANSFORMATIONS, TransformationSelection, UserContext};

/// Why a run did not produce a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No transformations were selected.
    EmptySelection,
    /// More transformations than the configured bound.
    SelectionBoundsExceeded { len: usize, max: usize },
    /// Source text is empty or whitespace.
    EmptySourceText,
    /// The gateway call failed.
    Gateway(GatewayError),
}

impl PipelineError {
    /// Gateway failure category, if the error came from the gateway.
    pub fn gateway_kind(&self) -> Option<GatewayErrorKind> {
        match self {
            PipelineError::Gateway(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::EmptySelection => write!(f, "Select at least one transformation"),
            PipelineError::SelectionBoundsExceeded { len, max } => write!(
                f,
                "{len} transformations selected; at most {max} can be applied at once"
            ),
            PipelineError::EmptySourceText => write!(f, "There is no text to transform"),
            PipelineError::Gateway(e) => write!(f, "Transformation failed ({})", e.kind),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Gateway(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GatewayError> for PipelineError {
    fn from(e: GatewayError) -> Self {
        PipelineError::Gateway(e)
    }
}

/// Runs selections against a [`ModelGateway`].
///
/// Makes at most one gateway call and at most one history append per run.
pub struct TransformPipeline<G> {
    gateway: G,
    max_transformations: usize,
}

impl<G: ModelGateway> TransformPipeline<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            max_transformations: DEFAULT_MAX_TRANSFORMATIONS,
        }
    }

    #[must_use]
    pub fn with_max_transformations(mut self, max: usize) -> Self {
        self.max_transformations = max;
        self
    }

    pub fn max_transformations(&self) -> usize {
        self.max_transformations
    }

    /// Applies `selection` to `source_text` and appends the result to `history`.
    ///
    /// The history is borrowed for the whole call, so a second run on the
    /// same history cannot start until this one finishes.
    ///
    /// # Errors
    /// Validation errors are returned before any gateway call. Gateway errors
    /// are returned unchanged and leave `history` untouched.
    pub async fn run(
        &self,
        selection: &TransformationSelection,
        source_text: &str,
        user_context: Option<&UserContext>,
        history: &mut VersionHistory,
    ) -> Result<String, PipelineError> {
        if selection.is_empty() {
            return Err(PipelineError::EmptySelection);
        }
        if selection.len() > self.max_transformations {
            return Err(PipelineError::SelectionBoundsExceeded {
                len: selection.len(),
                max: self.max_transformations,
            });
        }
        if source_text.trim().is_empty() {
            return Err(PipelineError::EmptySourceText);
        }

        let system_prompt = compose(&selection.prompts(), user_context);
        tracing::info!(
            transformations = selection.len(),
            source_chars = source_text.len(),
            "running transformation"
        );

        match self.gateway.transform(source_text, &system_prompt).await {
            Ok(result) => {
                history.append(result.as_str());
                tracing::info!(
                    version = history.position(),
                    count = history.count(),
                    "transformation applied"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind, "transformation failed");
                Err(PipelineError::Gateway(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::providers::GatewayResult;
    use crate::transforms::TransformationSpec;

    /// Replays canned outcomes and records every call.
    struct FakeGateway {
        outcomes: Mutex<Vec<GatewayResult<String>>>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl FakeGateway {
        fn new(outcomes: Vec<GatewayResult<String>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelGateway for FakeGateway {
        fn transform(
            &self,
            _source_text: &str,
            system_prompt: &str,
        ) -> impl Future<Output = GatewayResult<String>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(system_prompt.to_string());
            let outcome = self.outcomes.lock().unwrap().remove(0);
            async move { outcome }
        }
    }

    fn spec(id: u64, prompt: &str) -> TransformationSpec {
        TransformationSpec {
            id,
            name: format!("T{id}"),
            category: "Test".to_string(),
            prompt_text: prompt.to_string(),
            user_created: false,
            sort_order: 0,
        }
    }

    fn selection(prompts: &[&str]) -> TransformationSelection {
        prompts
            .iter()
            .zip(1..)
            .map(|(p, id)| spec(id, p))
            .collect()
    }

    #[tokio::test]
    async fn test_success_appends_one_version() {
        let gateway = FakeGateway::new(vec![Ok("Fixed text.".to_string())]);
        let pipeline = TransformPipeline::new(&gateway);
        let mut history = VersionHistory::with_original("teh text");

        let result = pipeline
            .run(&selection(&["Fix grammar"]), "teh text", None, &mut history)
            .await
            .unwrap();

        assert_eq!(result, "Fixed text.");
        assert_eq!(gateway.calls(), 1);
        assert_eq!(history.count(), 2);
        assert_eq!(history.position(), 2);
        assert_eq!(history.current(), "Fixed text.");
        assert_eq!(history.original(), "teh text");
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_history_untouched() {
        let gateway = FakeGateway::new(vec![Err(GatewayError::transport("Request timed out"))]);
        let pipeline = TransformPipeline::new(&gateway);
        let mut history = VersionHistory::with_original("draft");

        let err = pipeline
            .run(&selection(&["Shorten"]), "draft", None, &mut history)
            .await
            .unwrap_err();

        assert_eq!(err.gateway_kind(), Some(GatewayErrorKind::Transport));
        assert_eq!(gateway.calls(), 1);
        assert_eq!(history.count(), 1);
        assert_eq!(history.current(), "draft");
    }

    #[tokio::test]
    async fn test_oversized_selection_rejected_before_call() {
        let gateway = FakeGateway::new(vec![]);
        let pipeline = TransformPipeline::new(&gateway).with_max_transformations(5);
        let mut history = VersionHistory::with_original("draft");

        let err = pipeline
            .run(
                &selection(&["a", "b", "c", "d", "e", "f"]),
                "draft",
                None,
                &mut history,
            )
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::SelectionBoundsExceeded { len: 6, max: 5 });
        assert_eq!(gateway.calls(), 0);
        assert_eq!(history.count(), 1);
    }

    #[tokio::test]
    async fn test_empty_selection_and_blank_text_rejected() {
        let gateway = FakeGateway::new(vec![]);
        let pipeline = TransformPipeline::new(&gateway);
        let mut history = VersionHistory::new();

        let err = pipeline
            .run(&TransformationSelection::new(), "text", None, &mut history)
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptySelection);

        let err = pipeline
            .run(&selection(&["Fix"]), "  \n\t", None, &mut history)
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptySourceText);
        assert_eq!(gateway.calls(), 0);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_composed_in_selection_order_with_context() {
        let gateway = FakeGateway::new(vec![Ok("ok".to_string())]);
        let pipeline = TransformPipeline::new(&gateway);
        let mut history = VersionHistory::with_original("hello");
        let context: UserContext = [("name", "Dana")].into_iter().collect();

        pipeline
            .run(
                &selection(&["Fix grammar", "Shorten"]),
                "hello",
                Some(&context),
                &mut history,
            )
            .await
            .unwrap();

        let prompt = gateway.last_prompt.lock().unwrap().clone().unwrap();
        let fix = prompt.find("Fix grammar").unwrap();
        let shorten = prompt.find("Shorten").unwrap();
        assert!(fix < shorten);
        assert!(prompt.contains("name: Dana"));
    }

    #[tokio::test]
    async fn test_run_after_going_back_truncates_redo_branch() {
        let gateway = FakeGateway::new(vec![Ok("B".to_string()), Ok("C".to_string())]);
        let pipeline = TransformPipeline::new(&gateway);
        let mut history = VersionHistory::with_original("A");
        let sel = selection(&["Edit"]);

        pipeline.run(&sel, "A", None, &mut history).await.unwrap();
        history.go_back();
        pipeline.run(&sel, "A", None, &mut history).await.unwrap();

        let texts: Vec<_> = history.versions().map(|v| v.text).collect();
        assert_eq!(texts, vec!["A", "C"]);
        assert_eq!(history.position(), 2);
    }

    #[test]
    fn test_gateway_error_is_error_source() {
        let err = PipelineError::from(GatewayError::auth("HTTP 401"));
        assert_eq!(err.to_string(), "Transformation failed (auth)");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "HTTP 401");
    }
}
