//! Thin resource layer on top of [`Executor`].
//!
//! Resource methods build a path and parameters, hand them to the executor and
//! return an [`Outcome`]. Faults from below the executor become
//! `Outcome::Failure` with no status code.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::audit::{AuditLogger, AuditStore};
use crate::config::ApiConfig;
use crate::error::Error;
use crate::executor::{Call, Executor, Fields, Method, RawResponse};
use crate::files::Attachments;
use crate::response::Outcome;

/// Query parameters appended to a resource path.
pub type Query<'a> = &'a [(&'a str, String)];

#[derive(Debug, Clone)]
pub struct Desk365 {
    config: ApiConfig,
    executor: Executor,
}

impl Desk365 {
    pub fn new(config: ApiConfig, executor: Executor) -> Self {
        Self { config, executor }
    }

    /// Client over the default reqwest transport, auditing into `store`.
    pub fn with_audit_store(config: ApiConfig, store: Arc<dyn AuditStore>) -> Self {
        Self::new(config, Executor::with_reqwest(AuditLogger::new(store)))
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str, query: Query<'_>) -> String {
        self.config.endpoint(path, query)
    }

    /// URL a `send` with these arguments would hit, GET fields included.
    pub fn request_url(&self, method: Method, path: &str, query: Query<'_>, fields: &Fields) -> String {
        let call = self.call(method, path, query, fields.clone(), "");
        call.url().unwrap_or(call.endpoint)
    }

    fn call(&self, method: Method, path: &str, query: Query<'_>, fields: Fields, operation: &str) -> Call {
        Call::new(method, self.endpoint(path, query))
            .headers(self.config.auth_headers())
            .fields(fields)
            .timeout(self.config.timeout())
            .operation(operation)
    }

    /// Sends a JSON/query call. `action` names the call in failure messages.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        fields: Fields,
        operation: &str,
        action: &str,
    ) -> Outcome {
        let call = self.call(method, path, query, fields, operation);
        settle(self.executor.execute(call).await, operation, action)
    }

    /// Sends a multipart call carrying `attachments`.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        fields: Fields,
        attachments: Attachments,
        operation: &str,
        action: &str,
    ) -> Outcome {
        let call = self.call(method, path, query, fields, operation);
        settle(
            self.executor.execute_with_files(call, attachments).await,
            operation,
            action,
        )
    }

    pub fn tickets(&self) -> Tickets<'_> {
        Tickets { client: self }
    }
}

fn settle(result: Result<RawResponse, Error>, operation: &str, action: &str) -> Outcome {
    match result {
        Ok(response) => response.outcome(),
        Err(err) => {
            tracing::error!(operation, error = %err, "desk365 api error");
            Outcome::failure(format!("Failed to {action}: {err}"))
        }
    }
}

fn fields_of(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Ticket endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Tickets<'a> {
    client: &'a Desk365,
}

impl<'a> Tickets<'a> {
    pub async fn list(&self, filters: Query<'_>) -> Outcome {
        self.client
            .send(Method::Get, "tickets", filters, Fields::new(), "getAllTickets", "get tickets")
            .await
    }

    pub async fn get(&self, ticket_number: &str) -> Outcome {
        self.client
            .send(
                Method::Get,
                &format!("tickets/{ticket_number}"),
                &[],
                Fields::new(),
                "getTicket",
                "get ticket",
            )
            .await
    }

    pub async fn search(&self, text: &str, filters: Query<'_>) -> Outcome {
        let mut query: Vec<(&str, String)> = filters.to_vec();
        query.push(("search", text.to_string()));
        self.client
            .send(
                Method::Get,
                "tickets/search",
                &query,
                Fields::new(),
                "searchTickets",
                "search tickets",
            )
            .await
    }

    pub async fn create(&self, ticket: Fields) -> Outcome {
        self.client
            .send(Method::Post, "tickets/create", &[], ticket, "createTicket", "create ticket")
            .await
    }

    /// The ticket itself travels JSON-encoded in the `ticket_object` query
    /// parameter; the body carries only the files.
    pub async fn create_with_attachment(&self, ticket: Fields, attachments: Attachments) -> Outcome {
        let ticket_object = Value::Object(ticket).to_string();
        self.client
            .upload(
                Method::Post,
                "tickets/create_with_attachment",
                &[("ticket_object", ticket_object)],
                Fields::new(),
                attachments,
                "createTicketWithAttachment",
                "create ticket",
            )
            .await
    }

    pub async fn update(&self, ticket_number: &str, changes: Fields) -> Outcome {
        self.client
            .send(
                Method::Put,
                "tickets/update",
                &[("ticket_number", ticket_number.to_string())],
                changes,
                "updateTicket",
                "update ticket",
            )
            .await
    }

    pub async fn update_status(&self, ticket_number: &str, status: &str) -> Outcome {
        self.update(ticket_number, fields_of(json!({ "status": status })))
            .await
    }

    pub async fn update_priority(&self, ticket_number: &str, priority: &str) -> Outcome {
        self.update(ticket_number, fields_of(json!({ "priority": priority })))
            .await
    }

    pub async fn close(&self, ticket_number: &str) -> Outcome {
        self.update_status(ticket_number, "closed").await
    }

    pub async fn reopen(&self, ticket_number: &str) -> Outcome {
        self.update_status(ticket_number, "open").await
    }

    pub async fn add_reply(&self, ticket_number: &str, reply: Fields) -> Outcome {
        let mut reply = reply;
        reply.insert("ticket_number".into(), Value::String(ticket_number.to_string()));
        self.client
            .send(Method::Post, "tickets/add_reply", &[], reply, "addReply", "add reply")
            .await
    }

    pub async fn delete(&self, ticket_number: &str) -> Outcome {
        self.client
            .send(
                Method::Delete,
                &format!("tickets/{ticket_number}"),
                &[],
                Fields::new(),
                "deleteTicket",
                "delete ticket",
            )
            .await
    }

    pub async fn upload_attachment(
        &self,
        ticket_number: &str,
        attachments: Attachments,
        metadata: Fields,
    ) -> Outcome {
        self.attachments(ticket_number)
            .upload(attachments, metadata)
            .await
    }

    pub fn attachments<'t>(&self, ticket_number: &'t str) -> TicketAttachments<'a, 't> {
        TicketAttachments {
            client: self.client,
            ticket_number,
        }
    }

    pub fn comments<'t>(&self, ticket_number: &'t str) -> TicketComments<'a, 't> {
        TicketComments {
            client: self.client,
            ticket_number,
        }
    }
}

/// Attachment endpoints under `tickets/{ticket_number}/attachments`.
#[derive(Debug, Clone, Copy)]
pub struct TicketAttachments<'a, 't> {
    client: &'a Desk365,
    ticket_number: &'t str,
}

impl TicketAttachments<'_, '_> {
    fn path(&self, rest: &str) -> String {
        format!("tickets/{}/attachments{rest}", self.ticket_number)
    }

    pub async fn list(&self, params: Query<'_>) -> Outcome {
        self.client
            .send(Method::Get, &self.path(""), params, Fields::new(), "getAttachments", "get attachments")
            .await
    }

    pub async fn get(&self, attachment_id: &str) -> Outcome {
        self.client
            .send(
                Method::Get,
                &self.path(&format!("/{attachment_id}")),
                &[],
                Fields::new(),
                "getAttachment",
                "get attachment",
            )
            .await
    }

    pub async fn delete(&self, attachment_id: &str) -> Outcome {
        self.client
            .send(
                Method::Delete,
                &self.path(&format!("/{attachment_id}")),
                &[],
                Fields::new(),
                "deleteAttachment",
                "delete attachment",
            )
            .await
    }

    pub async fn download(&self, attachment_id: &str) -> Outcome {
        self.client
            .send(
                Method::Get,
                &self.path(&format!("/{attachment_id}/download")),
                &[],
                Fields::new(),
                "downloadAttachment",
                "download attachment",
            )
            .await
    }

    pub async fn upload(&self, attachments: Attachments, metadata: Fields) -> Outcome {
        self.client
            .upload(
                Method::Post,
                &self.path(""),
                &[],
                metadata,
                attachments,
                "uploadAttachment",
                "upload attachment",
            )
            .await
    }
}

/// Comment endpoints. New comments go through the reply endpoint.
#[derive(Debug, Clone, Copy)]
pub struct TicketComments<'a, 't> {
    client: &'a Desk365,
    ticket_number: &'t str,
}

impl TicketComments<'_, '_> {
    fn path(&self, rest: &str) -> String {
        format!("tickets/{}/comments{rest}", self.ticket_number)
    }

    pub async fn list(&self, params: Query<'_>) -> Outcome {
        self.client
            .send(Method::Get, &self.path(""), params, Fields::new(), "getComments", "get comments")
            .await
    }

    pub async fn get(&self, comment_id: &str) -> Outcome {
        self.client
            .send(
                Method::Get,
                &self.path(&format!("/{comment_id}")),
                &[],
                Fields::new(),
                "getComment",
                "get comment",
            )
            .await
    }

    pub async fn add(&self, comment: Fields) -> Outcome {
        let mut comment = comment;
        comment.insert("ticket_id".into(), Value::String(self.ticket_number.to_string()));
        self.client
            .send(Method::Post, "tickets/add_reply", &[], comment, "addComment", "add comment")
            .await
    }

    pub async fn update(&self, comment_id: &str, comment: Fields) -> Outcome {
        self.client
            .send(
                Method::Put,
                &self.path(&format!("/{comment_id}")),
                &[],
                comment,
                "updateComment",
                "update comment",
            )
            .await
    }

    pub async fn delete(&self, comment_id: &str) -> Outcome {
        self.client
            .send(
                Method::Delete,
                &self.path(&format!("/{comment_id}")),
                &[],
                Fields::new(),
                "deleteComment",
                "delete comment",
            )
            .await
    }
}
