use std::{future::Future, sync::Arc};

use axum::extract::FromRequestParts;
use greenlight_dal::Models;
use http::request::Parts;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, models: Models) -> Self {
        AppState {
            state: Arc::new(AppStateInner { app_config, models }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn models(&self) -> &Models {
        &self.state.models
    }
}

struct AppStateInner {
    models: Models,
    app_config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the running environment, e.g. development or production
    pub environment: String,
}

impl FromRequestParts<AppState> for Models {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        futures::future::ready(Ok(state.models().clone()))
    }
}
