//! Session controller: owns the token, the article collection, the edit
//! pointer and the loading flag, and keeps them consistent across API calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::{Article, ArticleDraft, ArticleId},
    protocol::LoginRequest,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    api::ArticleApi,
    credentials::CredentialStore,
    error::{ErrorKind, RequestError, RequestResult},
    forms::{ArticleField, ArticleForm},
};

pub const FAREWELL_MESSAGE: &str = "Goodbye!";
const WELCOME_FALLBACK: &str = "Welcome back!";
const LOGIN_FAILED: &str = "Login failed";
const CLEAR_FAILED: &str = "Logged out, but the saved session could not be removed";
const MISSING_CREDENTIALS: &str = "Username and password are required";
const NOT_LOGGED_IN: &str = "Please log in to continue";
const ARTICLES_FETCHED: &str = "Articles fetched successfully";
const FETCH_FAILED: &str = "Failed to fetch articles";
const ARTICLE_CREATED: &str = "Article created";
const CREATE_FAILED: &str = "Failed to create article";
const ARTICLE_UPDATED: &str = "Article updated";
const UPDATE_FAILED: &str = "Failed to update article";
const ARTICLE_DELETED: &str = "Article deleted";
const DELETE_FAILED: &str = "Failed to delete article";
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Articles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

/// Everything a view needs to render, copied out of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub view: View,
    pub message: String,
    pub loading: bool,
    pub articles: Vec<Article>,
    pub edit_target: Option<ArticleId>,
    pub form: ArticleForm,
}

impl SessionSnapshot {
    pub fn edit_article(&self) -> Option<&Article> {
        let id = self.edit_target?;
        self.articles.iter().find(|article| article.id == id)
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Changed(SessionSnapshot),
}

#[derive(Debug)]
struct SessionState {
    token: Option<String>,
    message: String,
    view: View,
    articles: Vec<Article>,
    edit_target: Option<ArticleId>,
    form: ArticleForm,
    in_flight: usize,
    logins_in_flight: usize,
    /// Bumped whenever a session ends; a login answer is only adopted if
    /// no session ended while it was in flight.
    generation: u64,
}

impl SessionState {
    fn new(token: Option<String>) -> Self {
        let view = if token.is_some() {
            View::Articles
        } else {
            View::Login
        };
        Self {
            token,
            message: String::new(),
            view,
            articles: Vec::new(),
            edit_target: None,
            form: ArticleForm::default(),
            in_flight: 0,
            logins_in_flight: 0,
            generation: 0,
        }
    }

    fn phase(&self) -> SessionPhase {
        if self.token.is_some() {
            SessionPhase::LoggedIn
        } else if self.logins_in_flight > 0 {
            SessionPhase::LoggingIn
        } else {
            SessionPhase::LoggedOut
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            view: self.view,
            message: self.message.clone(),
            loading: self.in_flight > 0,
            articles: self.articles.clone(),
            edit_target: self.edit_target,
            form: self.form.clone(),
        }
    }

    fn holds_token(&self, token: &str) -> bool {
        self.token.as_deref() == Some(token)
    }

    fn clear_selection(&mut self) {
        self.edit_target = None;
        self.form.reset();
    }

    /// Drops the edit pointer if it no longer resolves.
    fn reconcile_edit_target(&mut self) {
        if let Some(id) = self.edit_target {
            if !self.articles.iter().any(|article| article.id == id) {
                self.clear_selection();
            }
        }
    }

    fn end_session(&mut self) {
        self.token = None;
        self.articles.clear();
        self.clear_selection();
        self.message = FAREWELL_MESSAGE.to_string();
        self.view = View::Login;
        self.generation += 1;
    }
}

/// Releases the loading flag when the operation that took it finishes,
/// however it finishes.
struct OperationGuard<'a> {
    controller: &'a SessionController,
    login: bool,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let login = self.login;
        self.controller.update(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            if login {
                state.logins_in_flight = state.logins_in_flight.saturating_sub(1);
            }
        });
    }
}

pub struct SessionController {
    api: Arc<dyn ArticleApi>,
    store: Arc<dyn CredentialStore>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    /// Builds a controller, resuming the session whose token survived in `store`.
    pub fn new(api: Arc<dyn ArticleApi>, store: Arc<dyn CredentialStore>) -> Self {
        let token = match store.token() {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "credential store unreadable; starting logged out");
                None
            }
        };
        if token.is_some() {
            info!("resuming stored session");
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            store,
            state: Mutex::new(SessionState::new(token)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().token.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().in_flight > 0
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut SessionState) -> R) -> R {
        let (result, snapshot) = {
            let mut state = self.lock();
            let result = mutate(&mut *state);
            (result, state.snapshot())
        };
        // No subscribers is the normal headless case.
        let _ = self.events.send(SessionEvent::Changed(snapshot));
        result
    }

    /// Applies a response only if the session that issued the request is
    /// still the active one.
    fn apply_if_current(&self, token: &str, mutate: impl FnOnce(&mut SessionState)) -> bool {
        self.update(|state| {
            if !state.holds_token(token) {
                return false;
            }
            mutate(state);
            true
        })
    }

    fn begin_operation(&self, login: bool) -> OperationGuard<'_> {
        self.update(|state| {
            state.in_flight += 1;
            if login {
                state.logins_in_flight += 1;
            }
            state.message.clear();
        });
        OperationGuard {
            controller: self,
            login,
        }
    }

    fn reject_locally(&self, message: &str) -> RequestError {
        self.update(|state| state.message = message.to_string());
        RequestError::validation(message)
    }

    fn require_token(&self) -> RequestResult<String> {
        let token = self.lock().token.clone();
        token.ok_or_else(|| {
            self.update(|state| {
                state.message = NOT_LOGGED_IN.to_string();
                state.view = View::Login;
            });
            RequestError::validation(NOT_LOGGED_IN)
        })
    }

    /// Ends the in-memory session and drops the persisted token under the
    /// same lock, so a concurrent login cannot interleave between the two.
    fn forget_session(&self, state: &mut SessionState) -> anyhow::Result<()> {
        state.end_session();
        let cleared = self.store.clear_token();
        if let Err(err) = &cleared {
            state.message = format!("{CLEAR_FAILED}: {err}");
        }
        cleared
    }

    /// Maps a failed protected call onto state: a 401 ends the session,
    /// anything else becomes the visible message. Failures for a session
    /// that is no longer current are dropped.
    fn record_failure(&self, token: &str, operation: &'static str, err: &RequestError, fallback: &str) {
        let auth_rejected = err.is_auth_rejected();
        let message = err.user_message(fallback);
        let outcome = self.update(|state| {
            if !state.holds_token(token) {
                return None;
            }
            if auth_rejected {
                return Some(self.forget_session(state));
            }
            state.message = message;
            Some(Ok(()))
        });
        match outcome {
            None => debug!(operation, "discarding failure for a superseded session"),
            Some(Ok(())) if auth_rejected => {
                warn!(operation, "token rejected by server; session ended")
            }
            Some(Ok(())) => {
                warn!(operation, kind = ?err.kind, message = %err.message, "articles request failed")
            }
            Some(Err(store_err)) => {
                error!(operation, error = %format!("{store_err:#}"), "failed to clear rejected token")
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> RequestResult<()> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(self.reject_locally(MISSING_CREDENTIALS));
        }

        let generation = self.lock().generation;
        let _operation = self.begin_operation(true);
        info!(username, "logging in");
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(username, kind = ?err.kind, "login rejected");
                let message = err.user_message(LOGIN_FAILED);
                self.update(|state| {
                    if state.generation == generation {
                        state.message = message;
                    }
                });
                return Err(err);
            }
        };

        let adopted = self.update(|state| {
            if state.generation != generation {
                return None;
            }
            if let Err(store_err) = self.store.store_token(&response.token) {
                state.message = format!("Could not save session: {store_err}");
                return Some(Err(store_err));
            }
            if !state.holds_token(&response.token) {
                state.articles.clear();
                state.clear_selection();
            }
            state.token = Some(response.token.clone());
            state.message = response
                .message
                .clone()
                .unwrap_or_else(|| WELCOME_FALLBACK.to_string());
            state.view = View::Articles;
            Some(Ok(()))
        });
        match adopted {
            None => {
                debug!(username, "discarding login answer; the session ended while it was in flight");
                return Ok(());
            }
            Some(Err(store_err)) => {
                error!(error = %format!("{store_err:#}"), "failed to persist session token");
                return Err(RequestError::new(
                    ErrorKind::Storage,
                    format!("Could not save session: {store_err}"),
                ));
            }
            Some(Ok(())) => info!(username, "logged in"),
        }

        if let Err(err) = self.fetch_articles().await {
            debug!(kind = ?err.kind, "article fetch after login failed");
        }
        Ok(())
    }

    /// Ends the session locally. Valid at any time, including mid-request.
    /// The in-memory session always ends; a `Storage` error means the token
    /// is still on disk and the next start would resume it.
    pub fn logout(&self) -> RequestResult<()> {
        match self.update(|state| self.forget_session(state)) {
            Ok(()) => {
                info!("logged out");
                Ok(())
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "failed to clear stored token");
                Err(RequestError::new(
                    ErrorKind::Storage,
                    format!("{CLEAR_FAILED}: {err}"),
                ))
            }
        }
    }

    pub async fn fetch_articles(&self) -> RequestResult<()> {
        let Some(token) = self.lock().token.clone() else {
            debug!("not logged in; skipping article fetch");
            return Ok(());
        };

        let _operation = self.begin_operation(false);
        match self.api.list_articles(&token).await {
            Ok(reply) => {
                let count = reply.data.len();
                let applied = self.apply_if_current(&token, |state| {
                    state.articles = reply.data;
                    state.reconcile_edit_target();
                    state.message = reply
                        .message
                        .unwrap_or_else(|| ARTICLES_FETCHED.to_string());
                });
                if applied {
                    info!(count, "articles fetched");
                } else {
                    debug!("discarding article list for a superseded session");
                }
                Ok(())
            }
            Err(err) => {
                self.record_failure(&token, "fetch_articles", &err, FETCH_FAILED);
                Err(err)
            }
        }
    }

    pub async fn create_article(&self, draft: ArticleDraft) -> RequestResult<Article> {
        let token = self.require_token()?;
        let _operation = self.begin_operation(false);
        self.update(SessionState::clear_selection);

        match self.api.create_article(&token, &draft).await {
            Ok(reply) => {
                let article = reply.data;
                let created = article.clone();
                self.apply_if_current(&token, |state| {
                    state.articles.push(created);
                    state.message = reply
                        .message
                        .unwrap_or_else(|| ARTICLE_CREATED.to_string());
                });
                info!(article_id = %article.id, "article created");
                Ok(article)
            }
            Err(err) => {
                self.record_failure(&token, "create_article", &err, CREATE_FAILED);
                Err(err)
            }
        }
    }

    pub async fn update_article(&self, id: ArticleId, draft: ArticleDraft) -> RequestResult<Article> {
        let token = self.require_token()?;
        let known = self.update(|state| {
            state.clear_selection();
            state.articles.iter().any(|article| article.id == id)
        });
        if !known {
            return Err(self.reject_locally(&format!("Article {id} is not loaded")));
        }

        let _operation = self.begin_operation(false);
        match self.api.update_article(&token, id, &draft).await {
            Ok(reply) => {
                let article = reply.data;
                let updated = article.clone();
                self.apply_if_current(&token, |state| {
                    if let Some(slot) = state.articles.iter_mut().find(|a| a.id == id) {
                        *slot = updated;
                    }
                    state.message = reply
                        .message
                        .unwrap_or_else(|| ARTICLE_UPDATED.to_string());
                });
                info!(article_id = %id, "article updated");
                Ok(article)
            }
            Err(err) => {
                self.record_failure(&token, "update_article", &err, UPDATE_FAILED);
                Err(err)
            }
        }
    }

    pub async fn delete_article(&self, id: ArticleId) -> RequestResult<()> {
        let token = self.require_token()?;
        let _operation = self.begin_operation(false);

        match self.api.delete_article(&token, id).await {
            Ok(reply) => {
                self.apply_if_current(&token, |state| {
                    state.articles.retain(|article| article.id != id);
                    if state.edit_target == Some(id) {
                        state.clear_selection();
                    }
                    state.message = reply
                        .message
                        .unwrap_or_else(|| ARTICLE_DELETED.to_string());
                });
                info!(article_id = %id, "article deleted");
                Ok(())
            }
            Err(err) => {
                self.record_failure(&token, "delete_article", &err, DELETE_FAILED);
                Err(err)
            }
        }
    }

    /// Points the form at an existing article.
    pub fn select_for_edit(&self, id: ArticleId) -> RequestResult<()> {
        let found = self.update(|state| {
            let Some(article) = state.articles.iter().find(|a| a.id == id) else {
                return false;
            };
            state.form = ArticleForm::from_article(article);
            state.edit_target = Some(id);
            true
        });
        if found {
            Ok(())
        } else {
            Err(self.reject_locally(&format!("Article {id} is not loaded")))
        }
    }

    pub fn clear_selection(&self) {
        self.update(SessionState::clear_selection);
    }

    pub fn set_form_field(&self, field: ArticleField, value: &str) {
        self.update(|state| state.form.set(field, value));
    }

    /// Submits the form: updates the edit target if one is set, creates otherwise.
    pub async fn submit_form(&self) -> RequestResult<Article> {
        let (form, target) = {
            let state = self.lock();
            (state.form.clone(), state.edit_target)
        };
        let draft = match form.to_draft() {
            Ok(draft) => draft,
            Err(err) => return Err(self.reject_locally(&err.message)),
        };
        match target {
            Some(id) => self.update_article(id, draft).await,
            None => self.create_article(draft).await,
        }
    }

    /// Route guard for the articles screen: bounce to login without a
    /// token, otherwise show the screen and load its data.
    pub async fn open_articles_view(&self) -> RequestResult<()> {
        let logged_in = self.update(|state| {
            state.view = if state.token.is_some() {
                View::Articles
            } else {
                View::Login
            };
            state.token.is_some()
        });
        if !logged_in {
            debug!("articles view requested without a session");
            return Ok(());
        }
        self.fetch_articles().await
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
