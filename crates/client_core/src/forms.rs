//! Form models the view layer binds to.

use shared::domain::{Article, ArticleDraft, Topic};

use crate::error::{RequestError, RequestResult};

pub const USERNAME_MIN_LEN: usize = 3;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const CREDENTIAL_MAX_LEN: usize = 20;
pub const TITLE_MAX_LEN: usize = 50;
pub const TEXT_MAX_LEN: usize = 200;

fn clamp(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: &str, password: &str) -> Self {
        let mut form = Self::default();
        form.set_username(username);
        form.set_password(password);
        form
    }

    /// Builds a form from input the user never saw bounded, such as command
    /// line arguments. Overlong values are rejected instead of cut, so the
    /// credential sent is always the one typed.
    pub fn from_input(username: &str, password: &str) -> RequestResult<Self> {
        for (label, value) in [("Username", username), ("Password", password)] {
            if value.chars().count() > CREDENTIAL_MAX_LEN {
                return Err(RequestError::validation(format!(
                    "{label} is limited to {CREDENTIAL_MAX_LEN} characters"
                )));
            }
        }
        let form = Self::new(username, password);
        if !form.is_submittable() {
            return Err(RequestError::validation(format!(
                "Username needs at least {USERNAME_MIN_LEN} characters and password at least {PASSWORD_MIN_LEN}"
            )));
        }
        Ok(form)
    }

    pub fn set_username(&mut self, value: &str) {
        self.username = clamp(value, CREDENTIAL_MAX_LEN);
    }

    pub fn set_password(&mut self, value: &str) {
        self.password = clamp(value, CREDENTIAL_MAX_LEN);
    }

    /// Whether the submit control should be enabled.
    pub fn is_submittable(&self) -> bool {
        self.username.trim().chars().count() >= USERNAME_MIN_LEN
            && self.password.trim().chars().count() >= PASSWORD_MIN_LEN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleField {
    Title,
    Text,
    Topic,
}

impl ArticleField {
    pub fn max_len(self) -> Option<usize> {
        match self {
            Self::Title => Some(TITLE_MAX_LEN),
            Self::Text => Some(TEXT_MAX_LEN),
            Self::Topic => None,
        }
    }
}

/// Draft being edited. `topic` stays free text until submit so an
/// unselected topic can be represented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleForm {
    pub title: String,
    pub text: String,
    pub topic: String,
}

impl ArticleForm {
    pub fn from_article(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            text: article.text.clone(),
            topic: article.topic.to_string(),
        }
    }

    pub fn set(&mut self, field: ArticleField, value: &str) {
        let value = match field.max_len() {
            Some(max) => clamp(value, max),
            None => value.to_string(),
        };
        match field {
            ArticleField::Title => self.title = value,
            ArticleField::Text => self.text = value,
            ArticleField::Topic => self.topic = value,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn is_submittable(&self) -> bool {
        self.to_draft().is_ok()
    }

    pub fn to_draft(&self) -> RequestResult<ArticleDraft> {
        let title = self.title.trim();
        let text = self.text.trim();
        if title.is_empty() || text.is_empty() || self.topic.trim().is_empty() {
            return Err(RequestError::validation("Title, text and topic are required"));
        }
        if title.chars().count() > TITLE_MAX_LEN || text.chars().count() > TEXT_MAX_LEN {
            return Err(RequestError::validation(format!(
                "Title is limited to {TITLE_MAX_LEN} characters and text to {TEXT_MAX_LEN}"
            )));
        }
        let topic: Topic = self
            .topic
            .parse()
            .map_err(|err: shared::domain::UnknownTopic| RequestError::validation(err.to_string()))?;
        Ok(ArticleDraft {
            title: title.to_string(),
            text: text.to_string(),
            topic,
        })
    }
}
