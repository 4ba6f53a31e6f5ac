//! Router assembly: generate endpoints, artifact file serving, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - `POST /generate-html` and `POST /generate-pdf` (multipart field `image`)
/// - `GET /view/<file>` and `GET /download/<file>` served from the output directory
/// - `GET /health`
/// - request body limit from `MAX_UPLOAD_BYTES`
/// - CORS (allow any origin/method/headers) and HTTP trace layer
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(http::http_health))
        .route("/generate-html", post(http::http_generate_html))
        .route("/generate-pdf", post(http::http_generate_pdf))
        .route("/view/:name", get(http::http_artifact))
        .route("/download/:name", get(http::http_artifact))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use std::{
        path::{Path, PathBuf},
        sync::Mutex,
    };

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::compiler::{CompileError, DocumentCompiler, PdfLatex};
    use crate::config::ServerConfig;
    use crate::domain::{ProblemSet, Question, ResponseShape};
    use crate::inference::{parse_problem_set, InferenceClient, InferenceError};

    const BOUNDARY: &str = "worksheet-test-boundary";
    const BASE: &str = "http://127.0.0.1:5000";

    enum Reply {
        Set(ProblemSet),
        /// Raw model text, parsed the way the real client parses it.
        Text(&'static str),
        Status(u16),
    }

    /// Returns a canned reply and records each call.
    struct StubInference {
        reply: Reply,
        calls: Mutex<Vec<(String, ResponseShape)>>,
    }

    impl StubInference {
        fn with(reply: Reply) -> Arc<Self> {
            Arc::new(Self { reply, calls: Mutex::new(Vec::new()) })
        }

        fn ok(set: ProblemSet) -> Arc<Self> {
            Self::with(Reply::Set(set))
        }

        fn failing(status: u16) -> Arc<Self> {
            Self::with(Reply::Status(status))
        }
    }

    #[async_trait]
    impl InferenceClient for StubInference {
        async fn analyze_and_generate(
            &self,
            image_path: &Path,
            instruction: &str,
            shape: ResponseShape,
        ) -> Result<ProblemSet, InferenceError> {
            assert!(image_path.is_file(), "upload must be persisted before inference");
            self.calls.lock().unwrap().push((instruction.to_string(), shape));
            match &self.reply {
                Reply::Set(set) => Ok(shape.conform(set.clone())),
                Reply::Text(text) => parse_problem_set(text, shape),
                Reply::Status(status) => Err(InferenceError::Status {
                    status: *status,
                    message: "quota exceeded".into(),
                }),
            }
        }
    }

    /// Writes a fake PDF next to where pdflatex would.
    struct FakeCompiler;

    #[async_trait]
    impl DocumentCompiler for FakeCompiler {
        async fn compile(&self, source_path: &Path, output_dir: &Path) -> Result<PathBuf, CompileError> {
            let target = output_dir.join(source_path.file_stem().unwrap()).with_extension("pdf");
            tokio::fs::write(&target, b"%PDF-1.4 fake").await?;
            Ok(target)
        }
    }

    /// Names its output `<stem>-sheet.pdf` instead of `<stem>.pdf`.
    struct SuffixingCompiler;

    #[async_trait]
    impl DocumentCompiler for SuffixingCompiler {
        async fn compile(&self, source_path: &Path, output_dir: &Path) -> Result<PathBuf, CompileError> {
            let stem = source_path.file_stem().unwrap().to_string_lossy();
            let target = output_dir.join(format!("{stem}-sheet.pdf"));
            tokio::fs::write(&target, b"%PDF-1.4 fake").await?;
            Ok(target)
        }
    }

    fn question(i: usize, tier: &str) -> Question {
        Question {
            tier: Some(tier.into()),
            statement: format!("Soru {i}: $x^{i}$ ifadesini sadeleştiriniz."),
            a: "1".into(),
            b: "2".into(),
            c: "3".into(),
            d: "4".into(),
            e: "5".into(),
        }
    }

    fn sample_set() -> ProblemSet {
        let tiers = ["Temel", "Temel", "Temel", "Temel", "Orta", "Orta", "Yeni Nesil"];
        ProblemSet {
            topic: "Fonksiyonlar".into(),
            objective: "Tanım Kümesi".into(),
            questions: tiers.iter().enumerate().map(|(i, t)| question(i + 1, t)).collect(),
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        state: Arc<AppState>,
        router: Router,
    }

    fn harness(inference: Option<Arc<dyn InferenceClient>>, compiler: Arc<dyn DocumentCompiler>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_tests(dir.path());
        let state = Arc::new(AppState::with_parts(config, inference, compiler).unwrap());
        let router = build_router(state.clone());
        Harness { _dir: dir, state, router }
    }

    fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
        multipart_typed(field, "image/png", bytes)
    }

    fn multipart_typed(field: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"soru.png\"\r\n").as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post(router: &Router, uri: &str, body: Vec<u8>) -> Response {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        router.clone().oneshot(req).await.unwrap()
    }

    async fn get(router: &Router, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        router.clone().oneshot(req).await.unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn json(resp: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    fn files_with_extension(dir: &Path, ext: &str) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == ext))
            .count()
    }

    fn image() -> Vec<u8> {
        b"\x89PNG\r\n\x1a\nnot really a png".to_vec()
    }

    #[tokio::test]
    async fn generate_html_returns_viewable_link() {
        let stub = StubInference::ok(sample_set());
        let h = harness(Some(stub.clone()), Arc::new(FakeCompiler));

        let resp = post(&h.router, "/generate-html", multipart_body("image", &image())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let out = json(resp).await;
        assert_eq!(out["success"], true);
        let url = out["url"].as_str().unwrap();
        let path = url.strip_prefix(BASE).unwrap();
        assert!(path.starts_with("/view/") && path.ends_with(".html"), "{url}");

        let page = get(&h.router, path).await;
        assert_eq!(page.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(page).await).unwrap();
        assert!(html.contains("Fonksiyonlar"));
        assert!(html.contains("Tanım Kümesi"));
        assert_eq!(html.matches("class=\"question-box\"").count(), 7);
        assert!(html.contains("level-badge yeni\">Soru 7: Yeni Nesil"));

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, h.state.config.prompts.html_instruction);
        assert_eq!(calls[0].1, ResponseShape::Tiered);
    }

    #[tokio::test]
    async fn html_block_count_follows_parsed_questions() {
        let mut set = sample_set();
        set.questions.truncate(2);
        set.questions[1].c = String::new();
        let h = harness(Some(StubInference::ok(set)), Arc::new(FakeCompiler));

        let out = json(post(&h.router, "/generate-html", multipart_body("image", &image())).await).await;
        let path = out["url"].as_str().unwrap().strip_prefix(BASE).unwrap().to_string();
        let html = String::from_utf8(body_bytes(get(&h.router, &path).await).await).unwrap();
        assert_eq!(html.matches("class=\"question-box\"").count(), 2);
        assert!(html.contains("<div class=\"opt\">C) </div>"));
    }

    #[tokio::test]
    async fn numeric_and_null_choices_still_render() {
        let reply = r#"{"konu": "Toplama", "kazanim": null, "sorular": [
            {"seviye": "Temel", "metin": "2+2 kaçtır?", "A": 3, "B": 4, "C": 5, "D": 6, "E": null}
        ]}"#;
        let h = harness(Some(StubInference::with(Reply::Text(reply))), Arc::new(FakeCompiler));

        let resp = post(&h.router, "/generate-html", multipart_body("image", &image())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let path = json(resp).await["url"].as_str().unwrap().strip_prefix(BASE).unwrap().to_string();
        let html = String::from_utf8(body_bytes(get(&h.router, &path).await).await).unwrap();
        assert!(html.contains("Kazanım: Genel"));
        assert!(html.contains("<div class=\"opt\">A) 3</div>"));
        assert!(html.contains("<div class=\"opt\">E) </div>"));
    }

    #[tokio::test]
    async fn octet_stream_upload_is_stored_as_image() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(FakeCompiler));
        let octet = multipart_typed("image", "application/octet-stream", &image());
        let resp = post(&h.router, "/generate-html", octet).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(files_with_extension(h.state.store.upload_dir(), "png"), 1);
    }

    #[tokio::test]
    async fn pdf_link_follows_compiler_output_name() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(SuffixingCompiler));

        let out = json(post(&h.router, "/generate-pdf", multipart_body("image", &image())).await).await;
        let path = out["pdf_url"].as_str().unwrap().strip_prefix(BASE).unwrap().to_string();
        assert!(path.ends_with("-sheet.pdf"), "{path}");
        assert_eq!(get(&h.router, &path).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn repeated_uploads_get_distinct_ids_and_files() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(FakeCompiler));

        let first = json(post(&h.router, "/generate-html", multipart_body("image", &image())).await).await;
        let second = json(post(&h.router, "/generate-html", multipart_body("image", &image())).await).await;
        assert_ne!(first["url"], second["url"]);
        assert_eq!(files_with_extension(h.state.store.output_dir(), "html"), 2);
        assert_eq!(files_with_extension(h.state.store.upload_dir(), "png"), 2);
    }

    #[tokio::test]
    async fn missing_image_field_is_bad_request() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(FakeCompiler));
        for uri in ["/generate-html", "/generate-pdf"] {
            let resp = post(&h.router, uri, multipart_body("photo", &image())).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json(resp).await["error"], "Resim yüklenmedi");
        }
    }

    #[tokio::test]
    async fn non_multipart_body_is_missing_image() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(FakeCompiler));
        let req = Request::builder()
            .method("POST")
            .uri("/generate-html")
            .body(Body::from("{}"))
            .unwrap();
        let resp = h.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(resp).await["error"], "Resim yüklenmedi");
    }

    #[tokio::test]
    async fn inference_failure_is_server_error_without_output() {
        let h = harness(Some(StubInference::failing(429)), Arc::new(FakeCompiler));
        for uri in ["/generate-html", "/generate-pdf"] {
            let resp = post(&h.router, uri, multipart_body("image", &image())).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let message = json(resp).await["error"].as_str().unwrap().to_string();
            assert!(message.contains("quota exceeded"), "{message}");
        }
        let outputs = std::fs::read_dir(h.state.store.output_dir()).unwrap().count();
        assert_eq!(outputs, 0);
    }

    #[tokio::test]
    async fn disabled_inference_is_server_error() {
        let h = harness(None, Arc::new(FakeCompiler));
        let resp = post(&h.router, "/generate-html", multipart_body("image", &image())).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!json(resp).await["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_pdf_returns_download_link() {
        let stub = StubInference::ok(sample_set());
        let h = harness(Some(stub.clone()), Arc::new(FakeCompiler));

        let resp = post(&h.router, "/generate-pdf", multipart_body("image", &image())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let out = json(resp).await;
        assert_eq!(out["success"], true);
        assert!(out.get("url").is_none());
        let path = out["pdf_url"].as_str().unwrap().strip_prefix(BASE).unwrap().to_string();
        assert!(path.starts_with("/download/") && path.ends_with(".pdf"), "{path}");

        let pdf = get(&h.router, &path).await;
        assert_eq!(pdf.status(), StatusCode::OK);
        assert!(body_bytes(pdf).await.starts_with(b"%PDF"));

        // rendered source sits next to the PDF with every slot filled
        let id = path.trim_start_matches("/download/").trim_end_matches(".pdf");
        let tex = std::fs::read_to_string(h.state.store.output_path(&format!("{id}.tex"))).unwrap();
        for i in 1..=7 {
            assert!(tex.contains(&format!("Soru {i}: $x^{i}$")));
        }
        assert!(!tex.contains("{{"));

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls[0].0, h.state.config.prompts.pdf_instruction);
        assert_eq!(calls[0].1, ResponseShape::Flat);
    }

    #[tokio::test]
    async fn compiler_failure_leaves_no_pdf() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(PdfLatex::new("false")));

        let resp = post(&h.router, "/generate-pdf", multipart_body("image", &image())).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = json(resp).await["error"].as_str().unwrap().to_string();
        assert!(message.starts_with("false failed with"), "{message}");
        assert_eq!(files_with_extension(h.state.store.output_dir(), "pdf"), 0);
    }

    #[tokio::test]
    async fn unknown_artifact_is_not_found() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(FakeCompiler));
        assert_eq!(get(&h.router, "/view/nonexistent.html").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(get(&h.router, "/download/nonexistent.pdf").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn artifact_names_cannot_escape_output_dir() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(FakeCompiler));
        std::fs::write(h.state.store.upload_dir().join("secret.jpg"), b"x").unwrap();
        let resp = get(&h.router, "/view/..%2Fuploads%2Fsecret.jpg").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let h = harness(Some(StubInference::ok(sample_set())), Arc::new(FakeCompiler));
        let big = vec![0u8; h.state.config.max_upload_bytes + 1];
        let resp = post(&h.router, "/generate-html", multipart_body("image", &big)).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let h = harness(None, Arc::new(FakeCompiler));
        let resp = get(&h.router, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["ok"], true);
    }
}
