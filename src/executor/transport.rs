use async_trait::async_trait;
use reqwest::{
    header::HeaderMap,
    multipart::{Form, Part},
    Client,
};

use crate::error::{Error, Result};
use crate::headers::Headers;

use super::models::{PreparedRequest, RawResponse, RequestBody};

/// Sends one prepared request. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart { fields, files } => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                for part in files {
                    let file = part.file;
                    let body = Part::bytes(file.content)
                        .file_name(file.name.clone())
                        .mime_str(&file.content_type)
                        .map_err(|_| Error::InvalidContentType {
                            name: file.name,
                            content_type: file.content_type.clone(),
                        })?;
                    form = form.part(part.field, body);
                }
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|err| Error::from_reqwest(err, timeout))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|err| Error::from_reqwest(err, timeout))?;

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn collect_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}
