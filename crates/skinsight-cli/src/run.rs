//! Drives one session from the command line

use crate::cli::AnalyzeArgs;
use anyhow::Context;
use skinsight_core::prelude::*;
use std::path::Path;
use tracing::info;

/// Declared type for an upload, from the file extension
///
/// Unknown extensions map to `application/octet-stream`, which the session
/// rejects as a non-image.
pub(crate) fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Walk Intro, Questionnaire and Capture, upload the image and submit
pub(crate) async fn analyze(session: &Session, args: &AnalyzeArgs) -> anyhow::Result<serde_json::Value> {
    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("failed to read {}", args.image.display()))?;

    session.navigate(NavAction::BeginQuestionnaire)?;
    session.set_answer(AnswerUpdate::Age(args.age))?;
    session.set_answer(AnswerUpdate::SkinTone(args.skin_tone))?;
    for concern in &args.concerns {
        session.toggle_concern(*concern)?;
    }
    session.set_consent(args.consent)?;
    session.navigate(NavAction::ContinueToCapture)?;
    session.ingest_upload(&bytes, guess_mime(&args.image))?;

    info!(session_id = %session.id(), image = %args.image.display(), "submitting for analysis");
    match session.submit().await? {
        SubmitOutcome::Completed(body) => Ok(body),
        SubmitOutcome::Discarded => anyhow::bail!("session was reset before the analysis completed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skinsight_core::AnalysisError;
    use skinsight_test_utils::{jpeg_bytes, small_config, FakeAnalysisClient};
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn args_for(path: PathBuf) -> AnalyzeArgs {
        AnalyzeArgs {
            image: path,
            age: Some(41),
            skin_tone: SkinTone::Brown,
            concerns: [Concern::Dryness].into_iter().collect::<BTreeSet<_>>(),
            consent: true,
            endpoint: None,
            config: None,
        }
    }

    fn image_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, jpeg_bytes(160, 120)).unwrap();
        path
    }

    fn session(client: &Arc<FakeAnalysisClient>) -> Session {
        Session::builder(Arc::clone(client) as Arc<dyn AnalysisClient>)
            .config(small_config())
            .build()
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(guess_mime(Path::new("face.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("face.png")), "image/png");
        assert_eq!(guess_mime(Path::new("notes.txt")), "text/plain");
        assert_eq!(guess_mime(Path::new("face")), "application/octet-stream");
    }

    #[tokio::test]
    async fn analyze_returns_response_body() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeAnalysisClient::succeeding(json!({"score": 0.7})));
        let session = session(&client);

        let body = analyze(&session, &args_for(image_file(&dir, "face.jpg")))
            .await
            .unwrap();

        assert_eq!(body, json!({"score": 0.7}));
        assert_eq!(session.step(), Step::Results);
        let request = client.last_request().unwrap();
        assert_eq!(request.age_field(), "41");
        assert_eq!(request.skin_tone_field(), "brown");
        assert_eq!(request.concerns_field(), r#"["Dryness / Dehydration"]"#);
    }

    #[tokio::test]
    async fn analyze_without_consent_fails() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeAnalysisClient::succeeding(json!({})));
        let mut args = args_for(image_file(&dir, "face.jpg"));
        args.consent = false;

        let err = analyze(&session(&client), &args).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "You must consent to submit your image for automated analysis."
        );
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn analyze_rejects_non_image_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();
        let client = Arc::new(FakeAnalysisClient::succeeding(json!({})));

        let err = analyze(&session(&client), &args_for(path)).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::InvalidFileType(_))
        ));
    }

    #[tokio::test]
    async fn analyze_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeAnalysisClient::succeeding(json!({})));

        let err = analyze(&session(&client), &args_for(dir.path().join("absent.jpg")))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("failed to read"));
    }

    #[tokio::test]
    async fn analyze_surfaces_server_message() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeAnalysisClient::failing(AnalysisError::server(500, "")));

        let err = analyze(&session(&client), &args_for(image_file(&dir, "face.jpeg")))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Server error");
    }
}
