//! The articles REST collaborator: a trait seam plus the reqwest-backed client.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Article, ArticleDraft, ArticleId},
    error::ApiError,
    protocol::{
        article_route, ArticleListResponse, ArticleResponse, LoginRequest, LoginResponse,
        MessageResponse, ARTICLES_ROUTE, LOGIN_ROUTE,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ErrorKind, RequestError, RequestResult};

/// A successful API answer and the optional human-readable text the server sent with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    pub data: T,
    pub message: Option<String>,
}

impl<T> Reply<T> {
    pub fn new(data: T, message: Option<String>) -> Self {
        Self { data, message }
    }
}

#[async_trait]
pub trait ArticleApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> RequestResult<LoginResponse>;
    async fn list_articles(&self, token: &str) -> RequestResult<Reply<Vec<Article>>>;
    async fn create_article(
        &self,
        token: &str,
        draft: &ArticleDraft,
    ) -> RequestResult<Reply<Article>>;
    async fn update_article(
        &self,
        token: &str,
        id: ArticleId,
        draft: &ArticleDraft,
    ) -> RequestResult<Reply<Article>>;
    async fn delete_article(&self, token: &str, id: ArticleId) -> RequestResult<Reply<()>>;
}

pub struct HttpArticleApi {
    http: Client,
    base_url: String,
}

impl HttpArticleApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("invalid articles api url '{base_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("articles api url must be http(s), got '{base_url}'");
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder.header(AUTHORIZATION, token)
    }
}

async fn send_json<T: DeserializeOwned>(route: &str, builder: RequestBuilder) -> RequestResult<T> {
    let response = builder.send().await.map_err(|err| {
        warn!(route, error = %err, "articles api request failed to send");
        RequestError::transport(err.to_string())
    })?;
    let status = response.status();
    debug!(route, %status, "articles api responded");

    if status.is_success() {
        return response.json::<T>().await.map_err(|err| {
            warn!(route, error = %err, "articles api returned an unreadable body");
            RequestError::transport(format!("unreadable response body: {err}"))
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|error| error.message)
        .unwrap_or_default();
    let kind = if status == StatusCode::UNAUTHORIZED {
        ErrorKind::AuthRejected
    } else {
        ErrorKind::RequestFailed
    };
    warn!(route, %status, ?kind, %message, "articles api rejected request");
    Err(RequestError::new(kind, message))
}

#[async_trait]
impl ArticleApi for HttpArticleApi {
    async fn login(&self, request: &LoginRequest) -> RequestResult<LoginResponse> {
        let builder = self.http.post(self.url(LOGIN_ROUTE)).json(request);
        send_json(LOGIN_ROUTE, builder).await
    }

    async fn list_articles(&self, token: &str) -> RequestResult<Reply<Vec<Article>>> {
        let builder = self.authorized(self.http.get(self.url(ARTICLES_ROUTE)), token);
        let body: ArticleListResponse = send_json(ARTICLES_ROUTE, builder).await?;
        let (articles, message) = body.into_parts();
        Ok(Reply::new(articles, message))
    }

    async fn create_article(
        &self,
        token: &str,
        draft: &ArticleDraft,
    ) -> RequestResult<Reply<Article>> {
        let builder = self
            .authorized(self.http.post(self.url(ARTICLES_ROUTE)), token)
            .json(draft);
        let body: ArticleResponse = send_json(ARTICLES_ROUTE, builder).await?;
        let (article, message) = body.into_parts();
        Ok(Reply::new(article, message))
    }

    async fn update_article(
        &self,
        token: &str,
        id: ArticleId,
        draft: &ArticleDraft,
    ) -> RequestResult<Reply<Article>> {
        let route = article_route(id);
        let builder = self
            .authorized(self.http.put(self.url(&route)), token)
            .json(draft);
        let body: ArticleResponse = send_json(&route, builder).await?;
        let (article, message) = body.into_parts();
        Ok(Reply::new(article, message))
    }

    async fn delete_article(&self, token: &str, id: ArticleId) -> RequestResult<Reply<()>> {
        let route = article_route(id);
        let builder = self.authorized(self.http.delete(self.url(&route)), token);
        let body: MessageResponse = send_json(&route, builder).await?;
        Ok(Reply::new((), Some(body.message)))
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
