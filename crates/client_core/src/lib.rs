//! Client side of the articles service: the session controller and the
//! collaborators it is wired to.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod forms;
pub mod session;

pub use api::{ArticleApi, HttpArticleApi, Reply};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ErrorKind, RequestError, RequestResult};
pub use forms::{ArticleField, ArticleForm, LoginForm};
pub use session::{SessionController, SessionEvent, SessionPhase, SessionSnapshot, View};
