use reqwest::StatusCode;
use tracing::error;

use gifthive_types::models::Hive;

use crate::Context;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub search_term: String,
    pub search_data: Vec<Hive>,
    /// True once a search has completed, even with no hits.
    pub search_performed: bool,
    pub error_message: String,
}

impl SearchState {
    pub fn results(self, term: &str, search_data: Vec<Hive>) -> Self {
        Self {
            search_term: term.to_string(),
            search_data,
            search_performed: true,
            error_message: String::new(),
        }
    }

    pub fn no_results(self, term: &str) -> Self {
        self.results(term, Vec::new())
    }

    pub fn failed(self, message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            ..self
        }
    }
}

pub struct SearchStore {
    ctx: Context,
    state: SearchState,
}

impl SearchStore {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            state: SearchState::default(),
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.state.search_term = term.into();
    }

    fn apply<F>(&mut self, transition: F)
    where
        F: FnOnce(SearchState) -> SearchState,
    {
        self.state = transition(std::mem::take(&mut self.state));
    }

    /// Search visible hives by name or id. A 404 from the server just
    /// means nothing matched.
    pub async fn search(&mut self, term: &str) {
        let token = match self.ctx.access_token() {
            Ok(token) => token,
            Err(e) => return self.apply(|s| s.failed(e.user_message())),
        };

        match self.ctx.api.search(&token, term).await {
            Ok(hives) => self.apply(|s| s.results(term, hives)),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
                self.apply(|s| s.no_results(term));
            }
            Err(e) => {
                error!("There was an error => {}", e);
                self.apply(|s| s.failed(e.user_message()));
            }
        }
    }
}
