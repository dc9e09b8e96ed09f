use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ArticleId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    JavaScript,
    React,
    Node,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::JavaScript, Topic::React, Topic::Node];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::JavaScript => "JavaScript",
            Topic::React => "React",
            Topic::Node => "Node",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic '{0}'; expected one of JavaScript, React, Node")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownTopic(raw.to_string()))
    }
}

/// A stored article. The server names the identity field `article_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(rename = "article_id", alias = "id")]
    pub id: ArticleId,
    pub title: String,
    pub text: String,
    pub topic: Topic,
}

impl Article {
    pub fn from_draft(id: ArticleId, draft: ArticleDraft) -> Self {
        Self {
            id,
            title: draft.title,
            text: draft.text,
            topic: draft.topic,
        }
    }

    pub fn to_draft(&self) -> ArticleDraft {
        ArticleDraft {
            title: self.title.clone(),
            text: self.text.clone(),
            topic: self.topic,
        }
    }
}

/// Unsaved article payload sent on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub text: String,
    pub topic: Topic,
}
