use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod feed;
pub mod game;
pub mod guess;
pub mod health;
pub mod internal;
pub mod results;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(game::router())
        .merge(guess::router())
        .merge(feed::router())
        .merge(results::router())
        .merge(internal::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
