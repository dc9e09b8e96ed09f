use std::sync::Arc;

use serde::Deserialize;
use shared::{
    domain::{Article, ArticleDraft, ArticleId, Topic},
    error::{ApiError, ErrorCode},
    protocol::{ArticleListResponse, ArticleResponse, LoginResponse, MessageResponse},
};
use tokio::sync::RwLock;
use tracing::info;

use crate::token::{mint_token, verify_token, TokenConfig};

const USERNAME_MIN_LEN: usize = 3;
const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, Default)]
pub struct ArticleBook {
    next_id: i64,
    articles: Vec<Article>,
}

impl ArticleBook {
    pub fn seeded() -> Self {
        let mut book = Self::default();
        for (title, text, topic) in [
            (
                "Closures",
                "Functions that remember the scope they were created in.",
                Topic::JavaScript,
            ),
            (
                "useEffect",
                "Synchronizing a component with an external system.",
                Topic::React,
            ),
            (
                "Streams",
                "Processing data piece by piece with backpressure.",
                Topic::Node,
            ),
        ] {
            book.insert(ArticleDraft {
                title: title.into(),
                text: text.into(),
                topic,
            });
        }
        book
    }

    fn insert(&mut self, draft: ArticleDraft) -> Article {
        self.next_id += 1;
        let article = Article::from_draft(ArticleId(self.next_id), draft);
        self.articles.push(article.clone());
        article
    }
}

#[derive(Clone)]
pub struct ApiContext {
    pub articles: Arc<RwLock<ArticleBook>>,
    pub tokens: TokenConfig,
}

impl ApiContext {
    pub fn new(tokens: TokenConfig, book: ArticleBook) -> Self {
        Self {
            articles: Arc::new(RwLock::new(book)),
            tokens,
        }
    }
}

/// Article body as sent by clients. Topic stays a string so a bad value gets
/// a JSON error message instead of an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct DraftPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub topic: String,
}

pub fn login(ctx: &ApiContext, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let username = username.trim();
    if username.chars().count() < USERNAME_MIN_LEN
        || password.trim().chars().count() < PASSWORD_MIN_LEN
    {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!(
                "username must be at least {USERNAME_MIN_LEN} characters and password at least {PASSWORD_MIN_LEN}"
            ),
        ));
    }
    let token = mint_token(&ctx.tokens, username)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))?;
    info!(username, "issued session token");
    Ok(LoginResponse {
        token,
        message: Some(format!("Welcome back, {username}!")),
    })
}

/// Resolves the `Authorization` header to the username it was issued to.
pub fn authenticate(ctx: &ApiContext, authorization: Option<&str>) -> Result<String, ApiError> {
    let token = authorization
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "Token required"))?;
    verify_token(&ctx.tokens, token)
        .map_err(|_| ApiError::new(ErrorCode::Unauthorized, "Token invalid or expired"))
}

pub async fn list_articles(
    ctx: &ApiContext,
    username: &str,
) -> Result<ArticleListResponse, ApiError> {
    let book = ctx.articles.read().await;
    Ok(ArticleListResponse::Wrapped {
        articles: book.articles.clone(),
        message: Some(format!("Here are your articles, {username}!")),
    })
}

pub async fn create_article(
    ctx: &ApiContext,
    username: &str,
    payload: DraftPayload,
) -> Result<ArticleResponse, ApiError> {
    let draft = validate_draft(payload)?;
    let article = ctx.articles.write().await.insert(draft);
    info!(username, article_id = %article.id, "article created");
    Ok(ArticleResponse::Wrapped {
        article,
        message: Some(format!("Well done, {username}. Great article!")),
    })
}

pub async fn update_article(
    ctx: &ApiContext,
    username: &str,
    id: ArticleId,
    payload: DraftPayload,
) -> Result<ArticleResponse, ApiError> {
    let draft = validate_draft(payload)?;
    let mut book = ctx.articles.write().await;
    let slot = book
        .articles
        .iter_mut()
        .find(|article| article.id == id)
        .ok_or_else(|| not_found(id))?;
    *slot = Article::from_draft(id, draft);
    let article = slot.clone();
    info!(username, article_id = %id, "article updated");
    Ok(ArticleResponse::Wrapped {
        article,
        message: Some(format!("Nice update, {username}!")),
    })
}

pub async fn delete_article(
    ctx: &ApiContext,
    username: &str,
    id: ArticleId,
) -> Result<MessageResponse, ApiError> {
    let mut book = ctx.articles.write().await;
    let before = book.articles.len();
    book.articles.retain(|article| article.id != id);
    if book.articles.len() == before {
        return Err(not_found(id));
    }
    info!(username, article_id = %id, "article deleted");
    Ok(MessageResponse {
        message: format!("Article {id} was deleted, {username}!"),
    })
}

fn validate_draft(payload: DraftPayload) -> Result<ArticleDraft, ApiError> {
    let title = payload.title.trim();
    let text = payload.text.trim();
    if title.is_empty() || text.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "title and text are required",
        ));
    }
    let topic: Topic = payload
        .topic
        .parse()
        .map_err(|err: shared::domain::UnknownTopic| {
            ApiError::new(ErrorCode::Validation, err.to_string())
        })?;
    Ok(ArticleDraft {
        title: title.to_string(),
        text: text.to_string(),
        topic,
    })
}

fn not_found(id: ArticleId) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("Article {id} not found"))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
