use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use reqwest::{header::CONTENT_TYPE, Url};

use crate::config::Config;
use crate::error::{ConfigError, SubmitError};
use crate::form::{validate, BirthForm, ReportPayload};
use crate::types::Place;

pub const FAILURE_NOTICE: &str = "Não foi possível gerar o relatório. Tente novamente.";

/// What the webhook sent back, before looking at the content type.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &Url,
        payload: &ReportPayload,
    ) -> Result<RawResponse, SubmitError>;
}

/// Side effects of a finished submission, supplied by the caller.
pub trait ReportSink {
    /// The page is replaced by the report. Nothing follows.
    fn replace_document(&mut self, html: String);
    fn open_pdf(&mut self, pdf: Vec<u8>);
    fn json_result(&mut self, value: Option<serde_json::Value>);
    fn alert(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Html(String),
    Pdf(Vec<u8>),
    Json(Option<serde_json::Value>),
}

impl ReportOutcome {
    pub fn from_response(response: RawResponse) -> Self {
        let mime = response
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();
        match mime.as_str() {
            "text/html" => {
                ReportOutcome::Html(String::from_utf8_lossy(&response.body).into_owned())
            }
            "application/pdf" => ReportOutcome::Pdf(response.body),
            _ => ReportOutcome::Json(serde_json::from_slice(&response.body).ok()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReportOutcome::Html(_) => "html",
            ReportOutcome::Pdf(_) => "pdf",
            ReportOutcome::Json(_) => "json",
        }
    }

    fn deliver(self, sink: &mut dyn ReportSink) {
        match self {
            ReportOutcome::Html(html) => sink.replace_document(html),
            ReportOutcome::Pdf(pdf) => sink.open_pdf(pdf),
            ReportOutcome::Json(value) => sink.json_result(value),
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &Url,
        payload: &ReportPayload,
    ) -> Result<RawResponse, SubmitError> {
        let res = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(SubmitError::Network)?;
        let status = res.status();
        if !status.is_success() {
            return Err(SubmitError::Status(status));
        }
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = res.bytes().await.map_err(SubmitError::Network)?;
        Ok(RawResponse {
            content_type,
            body: body.to_vec(),
        })
    }
}

pub struct ReportRequester<T> {
    webhook_url: Url,
    transport: T,
}

impl ReportRequester<HttpTransport> {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_transport(config, HttpTransport::new())
    }
}

impl<T: ReportTransport> ReportRequester<T> {
    pub fn with_transport(config: &Config, transport: T) -> Result<Self, ConfigError> {
        let webhook_url = config
            .webhook_url
            .clone()
            .ok_or(ConfigError::MissingWebhookUrl)?;
        Ok(Self {
            webhook_url,
            transport,
        })
    }

    pub async fn submit(
        &self,
        form: &BirthForm,
        place: Option<&Place>,
        sink: &mut dyn ReportSink,
    ) -> Result<&'static str, SubmitError> {
        self.submit_at(form, place, Local::now(), sink).await
    }

    /// Validates, sends one request and hands the answer to `sink`. Form
    /// errors are returned without alerting; transport failures alert once.
    pub async fn submit_at<Z: TimeZone>(
        &self,
        form: &BirthForm,
        place: Option<&Place>,
        now: DateTime<Z>,
        sink: &mut dyn ReportSink,
    ) -> Result<&'static str, SubmitError> {
        let Some(place) = place else {
            log::debug!("Submission blocked, no place selected");
            return Err(SubmitError::Invalid(validate(form, None, now.date_naive())));
        };
        let payload = ReportPayload::build(form, place, now).map_err(SubmitError::Invalid)?;

        log::info!(
            "Requesting report for {} ({} {})",
            payload.place.city,
            payload.place.timezone,
            payload.place.timezone_offset
        );
        match self.transport.post_json(&self.webhook_url, &payload).await {
            Ok(response) => {
                let outcome = ReportOutcome::from_response(response);
                let kind = outcome.kind();
                log::info!("Report received as {kind}");
                outcome.deliver(sink);
                Ok(kind)
            }
            Err(e) => {
                log::error!("Report request failed: {e}");
                sink.alert(FAILURE_NOTICE);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::PLACE_REQUIRED;
    use crate::types::PROVIDER;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    enum Reply {
        With(Option<&'static str>, &'static [u8]),
        Status(StatusCode),
        Offline,
    }

    #[derive(Clone)]
    struct FakeTransport {
        reply: Reply,
        sent: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl FakeTransport {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                sent: Arc::default(),
            }
        }
    }

    fn offline_error() -> reqwest::Error {
        reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err()
    }

    #[async_trait]
    impl ReportTransport for FakeTransport {
        async fn post_json(
            &self,
            _url: &Url,
            payload: &ReportPayload,
        ) -> Result<RawResponse, SubmitError> {
            self.sent
                .lock()
                .unwrap()
                .push(serde_json::to_value(payload).unwrap());
            match self.reply.clone() {
                Reply::With(content_type, body) => Ok(RawResponse {
                    content_type: content_type.map(str::to_owned),
                    body: body.to_vec(),
                }),
                Reply::Status(status) => Err(SubmitError::Status(status)),
                Reply::Offline => Err(SubmitError::Network(offline_error())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        document: Option<String>,
        pdfs: Vec<Vec<u8>>,
        json: Vec<Option<serde_json::Value>>,
        alerts: Vec<String>,
    }

    impl ReportSink for RecordingSink {
        fn replace_document(&mut self, html: String) {
            self.document = Some(html);
        }

        fn open_pdf(&mut self, pdf: Vec<u8>) {
            self.pdfs.push(pdf);
        }

        fn json_result(&mut self, value: Option<serde_json::Value>) {
            self.json.push(value);
        }

        fn alert(&mut self, message: &str) {
            self.alerts.push(message.to_string());
        }
    }

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "GEOAPIFY_API_KEY" => Some("k".to_string()),
            "REPORT_WEBHOOK_URL" => Some("https://hooks.example.com/report".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn form() -> BirthForm {
        BirthForm::new("Maria da Silva", "15/06/2024", "14:30", "maria@example.com")
    }

    fn place() -> Place {
        Place {
            city: "São Paulo".into(),
            admin: Some("São Paulo".into()),
            country: "Brasil".into(),
            country_code: "BR".into(),
            lat: -23.55,
            lon: -46.63,
            timezone: "America/Sao_Paulo".into(),
            provider: PROVIDER.into(),
            place_id: "sp".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 18, 0, 0).unwrap()
    }

    #[test]
    fn missing_webhook_is_a_construction_error() {
        let config = Config {
            webhook_url: None,
            ..config()
        };
        let err = ReportRequester::with_transport(&config, FakeTransport::new(Reply::Offline))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingWebhookUrl));
    }

    #[tokio::test]
    async fn html_replaces_the_document() {
        let transport = FakeTransport::new(Reply::With(
            Some("text/html; charset=utf-8"),
            b"<html><body>Mapa</body></html>",
        ));
        let sent = transport.sent.clone();
        let requester = ReportRequester::with_transport(&config(), transport).unwrap();
        let mut sink = RecordingSink::default();

        let kind = requester
            .submit_at(&form(), Some(&place()), now(), &mut sink)
            .await
            .unwrap();
        assert_eq!(kind, "html");
        assert_eq!(sink.document.as_deref(), Some("<html><body>Mapa</body></html>"));
        assert!(sink.alerts.is_empty());

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["birthDate"], "2024-06-15");
        assert_eq!(sent[0]["place"]["timezoneOffset"], "-03:00");
        assert_eq!(sent[0]["place"]["admin"], "São Paulo");
    }

    #[tokio::test]
    async fn pdf_is_opened() {
        let requester = ReportRequester::with_transport(
            &config(),
            FakeTransport::new(Reply::With(Some("application/pdf"), b"%PDF-1.7")),
        )
        .unwrap();
        let mut sink = RecordingSink::default();
        requester
            .submit_at(&form(), Some(&place()), now(), &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.pdfs, vec![b"%PDF-1.7".to_vec()]);
        assert_eq!(sink.document, None);
    }

    #[tokio::test]
    async fn other_content_is_parsed_as_json_best_effort() {
        let requester = ReportRequester::with_transport(
            &config(),
            FakeTransport::new(Reply::With(Some("application/json"), br#"{"ok":true}"#)),
        )
        .unwrap();
        let mut sink = RecordingSink::default();
        requester
            .submit_at(&form(), Some(&place()), now(), &mut sink)
            .await
            .unwrap();

        let garbled = ReportRequester::with_transport(
            &config(),
            FakeTransport::new(Reply::With(None, b"accepted")),
        )
        .unwrap();
        let kind = garbled
            .submit_at(&form(), Some(&place()), now(), &mut sink)
            .await
            .unwrap();
        assert_eq!(kind, "json");
        assert_eq!(sink.json, vec![Some(serde_json::json!({"ok": true})), None]);
        assert!(sink.alerts.is_empty());
    }

    #[tokio::test]
    async fn failures_alert_once_and_keep_the_form() {
        for reply in [Reply::Offline, Reply::Status(StatusCode::INTERNAL_SERVER_ERROR)] {
            let requester =
                ReportRequester::with_transport(&config(), FakeTransport::new(reply)).unwrap();
            let entered = form();
            let mut sink = RecordingSink::default();
            let err = requester
                .submit_at(&entered, Some(&place()), now(), &mut sink)
                .await
                .unwrap_err();
            assert!(matches!(err, SubmitError::Network(_) | SubmitError::Status(_)));
            assert_eq!(sink.alerts, vec![FAILURE_NOTICE.to_string()]);
            assert_eq!(entered, form());
        }
    }

    #[tokio::test]
    async fn invalid_forms_are_not_sent() {
        let transport = FakeTransport::new(Reply::With(Some("text/html"), b""));
        let sent = transport.sent.clone();
        let requester = ReportRequester::with_transport(&config(), transport).unwrap();
        let mut sink = RecordingSink::default();

        let err = requester
            .submit_at(&form(), None, now(), &mut sink)
            .await
            .unwrap_err();
        match err {
            SubmitError::Invalid(errors) => assert_eq!(errors.get("place"), Some(PLACE_REQUIRED)),
            other => panic!("unexpected {other:?}"),
        }

        let bad = BirthForm {
            birth_time: "25:00".into(),
            ..form()
        };
        assert!(matches!(
            requester.submit_at(&bad, Some(&place()), now(), &mut sink).await,
            Err(SubmitError::Invalid(_))
        ));
        assert!(sent.lock().unwrap().is_empty());
        assert!(sink.alerts.is_empty());
        assert_eq!(sink.document, None);
    }

    #[test]
    fn content_type_is_matched_without_parameters() {
        let outcome = ReportOutcome::from_response(RawResponse {
            content_type: Some("Application/PDF; name=report.pdf".into()),
            body: vec![1, 2, 3],
        });
        assert_eq!(outcome, ReportOutcome::Pdf(vec![1, 2, 3]));
    }
}
