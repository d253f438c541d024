//! Post publisher collaborator: creates the public post that represents a
//! published game. Publish treats a failure here as fatal before any
//! persistence happens, so implementations must fail loudly.

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

/// Content handed to the publisher when a game goes live.
#[derive(Debug, Clone)]
pub struct PostDraft {
    /// Game the post will represent.
    pub game_id: Uuid,
    /// Host display name, shown as the post author byline.
    pub host_username: String,
    /// The host's clue.
    pub clue: String,
    /// Low-end label of the spectrum.
    pub left_label: String,
    /// High-end label of the spectrum.
    pub right_label: String,
}

/// Reference to the created post.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct PostRef {
    /// Platform identifier of the post.
    pub post_id: String,
    /// Site-relative permalink.
    pub permalink: String,
    /// Absolute URL.
    pub url: String,
}

/// Errors raised while creating the public post.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Transport-level failure reaching the platform.
    #[error("post platform unreachable: {message}")]
    Unreachable { message: String },
    /// The platform answered with a non-success status.
    #[error("post platform rejected the request with status {status}")]
    Rejected { status: u16 },
    /// The platform answered with a payload we could not interpret.
    #[error("post platform returned an invalid payload: {message}")]
    InvalidPayload { message: String },
}

/// Creates a public post representing a published game.
pub trait PostPublisher: Send + Sync {
    /// Create the post; an error means nothing may be persisted.
    fn create_post(&self, draft: PostDraft) -> BoxFuture<'static, Result<PostRef, PublishError>>;
}

/// Publisher for single-node and development deployments: fabricates
/// deterministic local references instead of calling a platform.
#[derive(Debug, Clone, Default)]
pub struct LocalPostPublisher;

impl PostPublisher for LocalPostPublisher {
    fn create_post(&self, draft: PostDraft) -> BoxFuture<'static, Result<PostRef, PublishError>> {
        Box::pin(async move {
            let permalink = format!("/g/{}", draft.game_id);
            Ok(PostRef {
                post_id: format!("local-{}", draft.game_id),
                url: format!("http://localhost{permalink}"),
                permalink,
            })
        })
    }
}

#[cfg(feature = "http-publisher")]
pub use http::HttpPostPublisher;

#[cfg(feature = "http-publisher")]
mod http {
    use super::{PostDraft, PostPublisher, PostRef, PublishError};

    use futures::future::BoxFuture;
    use reqwest::Client;
    use serde::Serialize;

    #[derive(Serialize)]
    struct CreatePostBody {
        title: String,
        author: String,
        left_label: String,
        right_label: String,
        game_id: String,
    }

    /// Publisher talking to the platform's post-creation API over HTTP.
    #[derive(Clone)]
    pub struct HttpPostPublisher {
        client: Client,
        base_url: String,
    }

    impl HttpPostPublisher {
        /// Build a publisher for the given platform base URL.
        pub fn new(base_url: String) -> Result<Self, PublishError> {
            let client = Client::builder()
                .build()
                .map_err(|err| PublishError::Unreachable {
                    message: err.to_string(),
                })?;
            Ok(Self {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        }
    }

    impl PostPublisher for HttpPostPublisher {
        fn create_post(
            &self,
            draft: PostDraft,
        ) -> BoxFuture<'static, Result<PostRef, PublishError>> {
            let client = self.client.clone();
            let url = format!("{}/posts", self.base_url);

            Box::pin(async move {
                let body = CreatePostBody {
                    title: draft.clue.clone(),
                    author: draft.host_username,
                    left_label: draft.left_label,
                    right_label: draft.right_label,
                    game_id: draft.game_id.to_string(),
                };

                let response = client.post(&url).json(&body).send().await.map_err(|err| {
                    PublishError::Unreachable {
                        message: err.to_string(),
                    }
                })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(PublishError::Rejected {
                        status: status.as_u16(),
                    });
                }

                response
                    .json::<PostRef>()
                    .await
                    .map_err(|err| PublishError::InvalidPayload {
                        message: err.to_string(),
                    })
            })
        }
    }
}
