//! Email subscription: local validation, the create-subscriber call and the
//! form state that follows it.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{
    DbError, SubmitError, EMAIL_EXISTS, EMAIL_INVALID, EMAIL_REQUIRED, SUBSCRIBE_FALLBACK,
};
use crate::models::Subscriber;

/// Permissive `X@Y.Z` shape check, not full RFC validation.
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub fn validate_email(email: &str) -> Result<(), SubmitError> {
    if email.is_empty() {
        return Err(SubmitError::Validation(EMAIL_REQUIRED));
    }
    if !EMAIL_SHAPE.is_match(email) {
        return Err(SubmitError::Validation(EMAIL_INVALID));
    }
    Ok(())
}

/// The create-subscriber endpoint.
#[async_trait]
pub trait SubscriberApi: Send + Sync {
    async fn create_subscriber(&self, email: &str) -> Result<Subscriber, SubmitError>;
}

#[async_trait]
impl<T: SubscriberApi + ?Sized> SubscriberApi for &T {
    async fn create_subscriber(&self, email: &str) -> Result<Subscriber, SubmitError> {
        (**self).create_subscriber(email).await
    }
}

#[async_trait]
impl<T: SubscriberApi + ?Sized> SubscriberApi for Arc<T> {
    async fn create_subscriber(&self, email: &str) -> Result<Subscriber, SubmitError> {
        (**self).create_subscriber(email).await
    }
}

#[async_trait]
impl SubscriberApi for Database {
    async fn create_subscriber(&self, email: &str) -> Result<Subscriber, SubmitError> {
        match self.add_subscriber(email).await {
            Ok(subscriber) => Ok(subscriber),
            Err(DbError::Conflict(message)) => Err(SubmitError::Conflict(message)),
            Err(DbError::Sqlx(e)) => {
                warn!("Subscriber insert failed: {}", e);
                Err(SubmitError::Transport(SUBSCRIBE_FALLBACK.to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Talks to `POST /api/subscribers` on a remote server.
pub struct HttpSubscriberApi {
    client: Client,
    endpoint: String,
}

impl HttpSubscriberApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("MLDigest/1.0")
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/subscribers", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl SubscriberApi for HttpSubscriberApi {
    async fn create_subscriber(&self, email: &str) -> Result<Subscriber, SubmitError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(|e| {
                warn!("Subscribe request failed: {}", e);
                SubmitError::Transport(SUBSCRIBE_FALLBACK.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Subscriber>().await.map_err(|e| {
                warn!("Unreadable subscriber response: {}", e);
                SubmitError::Transport(SUBSCRIBE_FALLBACK.to_string())
            });
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .filter(|m| !m.is_empty());

        match message {
            Some(m) if status == StatusCode::BAD_REQUEST && m == EMAIL_EXISTS => {
                Err(SubmitError::Conflict(m))
            }
            Some(m) => Err(SubmitError::Transport(m)),
            None => Err(SubmitError::Transport(SUBSCRIBE_FALLBACK.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    /// Accepting input, showing the last error if any.
    Editing { error: Option<String> },
    Submitting,
    /// Terminal; the form no longer accepts input.
    Submitted,
}

/// Transient notification shown alongside the inline form state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub destructive: bool,
}

/// One subscription form instance.
pub struct SubscriptionSubmitter<A> {
    api: A,
    state: FormState,
    toast: Option<Toast>,
}

impl<A: SubscriberApi> SubscriptionSubmitter<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: FormState::Editing { error: None },
            toast: None,
        }
    }

    /// Rebuilds a form that was already submitted earlier.
    pub fn submitted(api: A) -> Self {
        Self {
            api,
            state: FormState::Submitted,
            toast: None,
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn is_submitted(&self) -> bool {
        self.state == FormState::Submitted
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FormState::Editing { error } => error.as_deref(),
            _ => None,
        }
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    pub async fn submit(&mut self, email: &str) -> Result<Subscriber, SubmitError> {
        if self.is_submitted() {
            return Err(SubmitError::AlreadySubmitted);
        }
        self.toast = None;

        if let Err(e) = validate_email(email) {
            self.state = FormState::Editing {
                error: Some(e.to_string()),
            };
            return Err(e);
        }

        self.state = FormState::Submitting;
        match self.api.create_subscriber(email).await {
            Ok(subscriber) => {
                info!("Subscribed {}", subscriber.email);
                self.state = FormState::Submitted;
                self.toast = Some(Toast {
                    title: "Successfully subscribed!".to_string(),
                    description: "Check your inbox for confirmation.".to_string(),
                    destructive: false,
                });
                Ok(subscriber)
            }
            Err(e) => {
                let message = e.to_string();
                self.state = FormState::Editing {
                    error: Some(message.clone()),
                };
                self.toast = Some(Toast {
                    title: "Subscription failed".to_string(),
                    description: message,
                    destructive: true,
                });
                Err(e)
            }
        }
    }
}
