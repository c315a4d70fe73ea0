use std::{sync::Arc, time::Instant};

use chrono::Utc;

use crate::audit::{AuditLogger, CallRecord};
use crate::error::{Error, Result};
use crate::files::{self, Attachments};
use crate::headers;

use super::{
    models::{field_text, Call, FilePart, Method, PreparedRequest, RawResponse, RequestBody},
    transport::{ReqwestTransport, Transport},
};

/// Sends calls one attempt at a time and audits every attempt.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    audit: AuditLogger,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, audit: AuditLogger) -> Self {
        Self { transport, audit }
    }

    pub fn with_reqwest(audit: AuditLogger) -> Self {
        Self::new(Arc::new(ReqwestTransport::default()), audit)
    }

    /// Sends `call` with its fields in the query string (GET) or as a JSON
    /// body (everything else).
    pub async fn execute(&self, call: Call) -> Result<RawResponse> {
        let request_body = call.body_text();
        let started = Instant::now();

        let mut endpoint = call.endpoint.clone();
        let result = match prepare_plain(&call) {
            Ok(request) => {
                endpoint = request.url.clone();
                self.transport.send(request).await
            }
            Err(err) => Err(err),
        };

        self.record(&call, endpoint, request_body, started, &result);
        result
    }

    /// Sends `call` as multipart form data with `attachments`.
    ///
    /// One resolved file goes under the `file` field, several under `files`.
    /// Any caller-supplied `Content-Type` is dropped so the transport can set
    /// the boundary.
    pub async fn execute_with_files(
        &self,
        call: Call,
        attachments: Attachments,
    ) -> Result<RawResponse> {
        let request_body = match (call.body_text(), attachments.marker()) {
            (Some(body), Some(marker)) => Some(format!("{body} {marker}")),
            (body, None) => body,
            (None, marker) => marker,
        };
        let started = Instant::now();

        let result = match prepare_multipart(&call, attachments).await {
            Ok(request) => self.transport.send(request).await,
            Err(err) => Err(err),
        };

        self.record(&call, call.endpoint.clone(), request_body, started, &result);
        result
    }

    fn record(
        &self,
        call: &Call,
        endpoint: String,
        request_body: Option<String>,
        started: Instant,
        result: &Result<RawResponse>,
    ) {
        let duration_ms = started.elapsed().as_millis() as u64;
        let sanitized = headers::sanitize(&call.headers);
        let (response_status, response_body, error_message) = match result {
            Ok(response) => (Some(response.status), Some(response.text()), None),
            Err(err) => (None, None, Some(err.to_string())),
        };

        tracing::debug!(
            method = %call.method,
            endpoint = %endpoint,
            operation = call.operation.as_deref().unwrap_or(""),
            status = ?response_status,
            duration_ms,
            "desk365 call finished"
        );

        self.audit.record(CallRecord {
            method: call.method,
            endpoint,
            request_headers: (!sanitized.is_empty()).then_some(sanitized),
            request_body,
            response_status,
            response_body,
            duration_ms,
            operation: call.operation.clone(),
            error_message,
            created_at: Utc::now(),
        });
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

fn prepare_plain(call: &Call) -> Result<PreparedRequest> {
    let (url, body) = match call.method {
        Method::Get => (call.url()?, RequestBody::Empty),
        _ if call.fields.is_empty() => (call.endpoint.clone(), RequestBody::Empty),
        _ => (
            call.endpoint.clone(),
            RequestBody::Json(serde_json::Value::Object(call.fields.clone())),
        ),
    };

    Ok(PreparedRequest {
        method: call.method,
        url,
        headers: call.headers.clone(),
        body,
        timeout: call.timeout,
    })
}

async fn prepare_multipart(call: &Call, attachments: Attachments) -> Result<PreparedRequest> {
    if !call.method.accepts_upload() {
        return Err(Error::UnsupportedUploadMethod(call.method));
    }

    let field = attachments.field_name();
    let mut files = Vec::with_capacity(attachments.len());
    for input in attachments.into_vec() {
        files.push(FilePart {
            field,
            file: files::normalize(input).await?,
        });
    }

    let fields = call
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), field_text(value)))
        .collect();

    Ok(PreparedRequest {
        method: call.method,
        url: call.endpoint.clone(),
        headers: headers::without_content_type(&call.headers),
        body: RequestBody::Multipart { fields, files },
        timeout: call.timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditStore;
    use crate::files::FileInput;
    use crate::headers::{Headers, REDACTED};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns a canned response (or fault) and remembers what it was sent.
    struct FakeTransport {
        reply: fn() -> Result<RawResponse>,
        sent: Mutex<Vec<PreparedRequest>>,
    }

    impl FakeTransport {
        fn new(reply: fn() -> Result<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<PreparedRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
            self.sent.lock().unwrap().push(request);
            (self.reply)()
        }
    }

    fn ok_tickets() -> Result<RawResponse> {
        Ok(RawResponse {
            status: 200,
            headers: Vec::new(),
            body: br#"{"data":[{"id":"1"}]}"#.to_vec(),
        })
    }

    fn unprocessable() -> Result<RawResponse> {
        Ok(RawResponse {
            status: 422,
            headers: Vec::new(),
            body: br#"{"message":"bad input"}"#.to_vec(),
        })
    }

    fn timed_out() -> Result<RawResponse> {
        Err(Error::Timeout(Duration::from_secs(30)))
    }

    fn auth_headers() -> Headers {
        vec![
            ("Authorization".into(), "Bearer secret-key".into()),
            ("Content-Type".into(), "application/json".into()),
        ]
    }

    fn setup(reply: fn() -> Result<RawResponse>) -> (Executor, Arc<FakeTransport>, Arc<MemoryAuditStore>) {
        let transport = FakeTransport::new(reply);
        let store = Arc::new(MemoryAuditStore::new());
        let executor = Executor::new(transport.clone(), AuditLogger::new(store.clone()));
        (executor, transport, store)
    }

    #[tokio::test]
    async fn execute_get_returns_success_outcome() -> anyhow::Result<()> {
        let (executor, transport, store) = setup(ok_tickets);

        let call = Call::new(Method::Get, "https://x/tickets")
            .headers(auth_headers())
            .timeout(Duration::from_secs(30))
            .operation("getAllTickets");
        let response = executor.execute(call).await?;

        assert_eq!(response.outcome().data(), Some(&json!([{"id": "1"}])));
        assert!(response.outcome().is_success());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].headers[0].1, "Bearer secret-key");

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response_status, Some(200));
        assert_eq!(records[0].error_message, None);
        assert_eq!(records[0].operation.as_deref(), Some("getAllTickets"));
        Ok(())
    }

    #[tokio::test]
    async fn execute_get_merges_fields_into_query() -> anyhow::Result<()> {
        let (executor, transport, store) = setup(ok_tickets);

        let call = Call::new(Method::Get, "https://x/apis/v3/tickets?page=2")
            .field("status", "open")
            .field("count", 25);
        executor.execute(call).await?;

        let sent = transport.sent();
        assert_eq!(sent[0].url, "https://x/apis/v3/tickets?page=2&count=25&status=open");
        assert_eq!(sent[0].body, RequestBody::Empty);
        assert_eq!(store.records()[0].endpoint, sent[0].url);
        Ok(())
    }

    #[tokio::test]
    async fn execute_post_sends_json_and_audits_body() -> anyhow::Result<()> {
        let (executor, transport, store) = setup(unprocessable);

        let call = Call::new(Method::Post, "https://x/apis/v3/tickets/create")
            .headers(auth_headers())
            .field("subject", "Printer jam")
            .operation("createTicket");
        let response = executor.execute(call).await?;

        let outcome = response.outcome();
        assert_eq!(outcome.message(), Some("bad input"));
        assert_eq!(outcome.status_code(), Some(422));

        assert_eq!(
            transport.sent()[0].body,
            RequestBody::Json(json!({"subject": "Printer jam"}))
        );

        let record = &store.records()[0];
        assert_eq!(record.request_body.as_deref(), Some(r#"{"subject":"Printer jam"}"#));
        assert_eq!(record.response_status, Some(422));
        assert_eq!(record.response_body.as_deref(), Some(r#"{"message":"bad input"}"#));
        Ok(())
    }

    #[tokio::test]
    async fn execute_audits_sanitized_headers_only() -> anyhow::Result<()> {
        let (executor, _transport, store) = setup(ok_tickets);

        let mut headers = auth_headers();
        headers.push(("X-API-Secret".into(), "shh".into()));
        executor
            .execute(Call::new(Method::Delete, "https://x/tickets/1").headers(headers))
            .await?;

        let recorded = store.records()[0].request_headers.clone().unwrap();
        assert_eq!(
            recorded,
            vec![
                ("Authorization".to_string(), REDACTED.to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-API-Secret".to_string(), REDACTED.to_string()),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn execute_timeout_is_reraised_and_recorded_once() {
        let (executor, _transport, store) = setup(timed_out);

        let call = Call::new(Method::Get, "https://x/tickets").operation("getAllTickets");
        let err = executor.execute(call).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response_status, None);
        assert_eq!(records[0].response_body, None);
        assert_eq!(
            records[0].error_message.as_deref(),
            Some("request timed out after 30s")
        );
        assert!(records[0].is_consistent());
    }

    #[tokio::test]
    async fn execute_invalid_get_endpoint_is_recorded() {
        let (executor, transport, store) = setup(ok_tickets);

        let call = Call::new(Method::Get, "not a url").field("q", "x");
        let err = executor.execute(call).await.unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
        assert!(transport.sent().is_empty());
        assert_eq!(store.records().len(), 1);
        assert!(store.records()[0].is_consistent());
    }

    #[tokio::test]
    async fn upload_many_files_uses_files_field() -> anyhow::Result<()> {
        let (executor, transport, store) = setup(ok_tickets);

        let call = Call::new(Method::Post, "https://x/apis/v3/tickets/9/attachments")
            .headers(auth_headers())
            .field("note", "logs")
            .operation("uploadAttachment");
        let attachments = Attachments::Many(vec![
            FileInput::bytes("a.txt", "alpha-content"),
            FileInput::bytes("b.txt", "beta-content"),
        ]);
        executor.execute_with_files(call, attachments).await?;

        let sent = transport.sent();
        let RequestBody::Multipart { fields, files } = &sent[0].body else {
            panic!("expected multipart body");
        };
        assert_eq!(fields, &vec![("note".to_string(), "logs".to_string())]);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|part| part.field == "files"));
        assert_eq!(files[0].file.name, "a.txt");
        assert_eq!(files[1].file.content, b"beta-content");

        assert!(sent[0]
            .headers
            .iter()
            .all(|(name, _)| !name.eq_ignore_ascii_case("content-type")));

        let body = store.records()[0].request_body.clone().unwrap();
        assert!(body.contains("a.txt"));
        assert!(body.contains("+1 more"));
        assert!(!body.contains("alpha-content"));
        assert!(!body.contains("beta-content"));
        Ok(())
    }

    #[tokio::test]
    async fn upload_single_element_list_uses_file_field() -> anyhow::Result<()> {
        let (executor, transport, store) = setup(ok_tickets);

        let call = Call::new(Method::Put, "https://x/upload");
        executor
            .execute_with_files(call, Attachments::Many(vec![FileInput::bytes("only.txt", "x")]))
            .await?;

        let sent = transport.sent();
        let RequestBody::Multipart { files, .. } = &sent[0].body else {
            panic!("expected multipart body");
        };
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].field, "file");
        assert_eq!(
            store.records()[0].request_body.as_deref(),
            Some("[FILE ATTACHED: only.txt]")
        );
        Ok(())
    }

    #[tokio::test]
    async fn upload_rejects_get_but_still_audits() {
        let (executor, transport, store) = setup(ok_tickets);

        let call = Call::new(Method::Get, "https://x/upload");
        let err = executor
            .execute_with_files(call, FileInput::bytes("a.txt", "a").into())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedUploadMethod(Method::Get)));
        assert!(transport.sent().is_empty());
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].error_message.is_some());
        assert!(records[0].is_consistent());
    }

    #[tokio::test]
    async fn upload_missing_file_faults_without_sending() {
        let (executor, transport, store) = setup(ok_tickets);

        let call = Call::new(Method::Post, "https://x/upload");
        let err = executor
            .execute_with_files(call, FileInput::path("/definitely/not/here.pdf").into())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FileRead { .. }));
        assert!(transport.sent().is_empty());
        let record = &store.records()[0];
        assert_eq!(record.request_body.as_deref(), Some("[FILE ATTACHED: here.pdf]"));
        assert!(record.error_message.as_deref().unwrap().contains("here.pdf"));
    }

    #[tokio::test]
    async fn unprovisioned_audit_store_does_not_affect_call() -> anyhow::Result<()> {
        let transport = FakeTransport::new(ok_tickets);
        let executor = Executor::new(transport, AuditLogger::disabled());

        let response = executor
            .execute(Call::new(Method::Get, "https://x/tickets"))
            .await?;
        assert_eq!(response.status, 200);
        Ok(())
    }
}
