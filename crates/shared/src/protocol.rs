use serde::{Deserialize, Serialize};

use crate::domain::Article;

pub const LOGIN_ROUTE: &str = "/api/login";
pub const ARTICLES_ROUTE: &str = "/api/articles";

pub fn article_route(id: crate::domain::ArticleId) -> String {
    format!("{ARTICLES_ROUTE}/{}", id.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a successful delete, and of any response that only carries text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Servers answer list requests either with a bare array or wrapped with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleListResponse {
    Wrapped {
        articles: Vec<Article>,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(Vec<Article>),
}

impl ArticleListResponse {
    pub fn into_parts(self) -> (Vec<Article>, Option<String>) {
        match self {
            ArticleListResponse::Wrapped { articles, message } => (articles, message),
            ArticleListResponse::Bare(articles) => (articles, None),
        }
    }
}

/// Create and update answer with the stored article, bare or wrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleResponse {
    Wrapped {
        article: Article,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(Article),
}

impl ArticleResponse {
    pub fn into_parts(self) -> (Article, Option<String>) {
        match self {
            ArticleResponse::Wrapped { article, message } => (article, message),
            ArticleResponse::Bare(article) => (article, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArticleId, Topic};

    #[test]
    fn list_response_accepts_bare_and_wrapped_shapes() {
        let article = serde_json::json!({
            "article_id": 1, "title": "t", "text": "x", "topic": "Node"
        });

        let bare: ArticleListResponse =
            serde_json::from_value(serde_json::json!([article.clone()])).expect("bare");
        let (articles, message) = bare.into_parts();
        assert_eq!(articles.len(), 1);
        assert!(message.is_none());

        let wrapped: ArticleListResponse = serde_json::from_value(serde_json::json!({
            "articles": [article],
            "message": "Here are your articles"
        }))
        .expect("wrapped");
        let (articles, message) = wrapped.into_parts();
        assert_eq!(articles[0].id, ArticleId(1));
        assert_eq!(articles[0].topic, Topic::Node);
        assert_eq!(message.as_deref(), Some("Here are your articles"));
    }

    #[test]
    fn article_response_prefers_wrapped_shape() {
        let wrapped: ArticleResponse = serde_json::from_value(serde_json::json!({
            "article": { "article_id": 3, "title": "t", "text": "x", "topic": "React" },
            "message": "created"
        }))
        .expect("wrapped");
        let (article, message) = wrapped.into_parts();
        assert_eq!(article.id, ArticleId(3));
        assert_eq!(message.as_deref(), Some("created"));
    }

    #[test]
    fn article_route_appends_id() {
        assert_eq!(article_route(ArticleId(42)), "/api/articles/42");
    }
}
