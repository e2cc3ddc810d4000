//! The query pipeline: candidate generation, optional direct routing,
//! model consultation, order validation, execution, and the final
//! response. Every request owns its intermediate structures; only the
//! catalog is shared, read-only, behind an `Arc`.

mod context;
mod model;
mod router;

use std::sync::Arc;
use std::time::Duration;

use geolens_candidates::{CandidateGenerator, ScoringConfig};
use geolens_catalog::Catalog;
use geolens_engine::{
    validate_and_expand, AggregateExecutor, EventExecutor, Storage, ValidatedOrder,
};
use geolens_protocol::{
    ChatTurn, ExecutionMode, LocationRef, ModelDecision, OrderPayload, Response, Viewport,
};

pub use context::{ContextBuilder, ModelContext, ReferenceSnippet};
pub use model::{ModelClient, ModelError, ScriptedModel};
pub use router::{Router, RouterState};

/// One query plus the caller-held conversation state.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    pub viewport: Option<Viewport>,
    /// Options from a prior disambiguate response, passed back by the
    /// caller on follow-ups ("show them all").
    pub prior_options: Vec<LocationRef>,
    pub history: Vec<ChatTurn>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

pub struct Pipeline {
    catalog: Arc<Catalog>,
    generator: CandidateGenerator,
    context: ContextBuilder,
    router: Router,
    model: Arc<dyn ModelClient>,
    storage: Arc<dyn Storage>,
    model_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<Catalog>,
        model: Arc<dyn ModelClient>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            generator: CandidateGenerator::new(catalog.clone()),
            context: ContextBuilder::default(),
            router: Router::new(),
            catalog,
            model,
            storage,
            model_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_scoring_config(mut self, config: ScoringConfig) -> Self {
        self.generator = CandidateGenerator::with_config(self.catalog.clone(), config);
        self
    }

    #[must_use]
    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Run one query to a final response. Candidate generation always
    /// runs; only the model consultation can be skipped, and only for
    /// structurally unambiguous routes.
    pub async fn run(&self, request: &QueryRequest) -> Response {
        let mut state = RouterState::CandidatesReady;
        let set = self
            .generator
            .generate(&request.query, request.viewport.as_ref());

        if let Some(response) =
            self.router
                .route_direct(&set, &request.query, &request.prior_options)
        {
            state = RouterState::Routed;
            log::debug!("routed without model consultation ({state:?})");
            return response;
        }

        let context = self.context.build(&request.query, &set, &self.catalog);
        let decision = tokio::time::timeout(
            self.model_timeout,
            self.model.decide(&context, &request.history),
        )
        .await;
        state = RouterState::ModelConsulted;
        log::debug!("model consulted ({state:?})");

        let decision = match decision {
            Ok(Ok(decision)) => decision,
            Ok(Err(err)) => {
                log::warn!("model call failed: {err}");
                return Response::chat(format!("The language model is unavailable: {err}"));
            }
            Err(_) => {
                log::warn!("model call timed out after {:?}", self.model_timeout);
                return Response::chat("The request timed out while consulting the model.");
            }
        };

        let response = self.finalize(decision).await;
        state = RouterState::Routed;
        log::debug!("routed after model consultation ({state:?})");
        response
    }

    /// Map the model's decision onto the final response shape. Orders pass
    /// through validation and execution first.
    async fn finalize(&self, decision: ModelDecision) -> Response {
        match decision {
            ModelDecision::Navigate { locations, summary } => {
                Response::Navigate { locations, summary }
            }
            ModelDecision::Disambiguate { options, query } => {
                Response::Disambiguate { options, query }
            }
            ModelDecision::Chat { message } => Response::chat(message),
            ModelDecision::Order { order, summary } => {
                let validated = validate_and_expand(&order, &self.catalog);
                self.execute_order(validated, summary).await
            }
        }
    }

    async fn execute_order(&self, validated: ValidatedOrder, summary: Option<String>) -> Response {
        let mut warnings = validated.warnings.clone();
        for item in validated.items.iter().filter(|i| !i.valid) {
            if let Some(error) = &item.error {
                warnings.push(format!(
                    "item {}/{} skipped: {error}",
                    item.source_id, item.metric
                ));
            }
        }

        if !validated.has_valid_items() {
            return Response::Chat {
                summary: "None of the requested items could be validated against the catalog."
                    .to_string(),
                warnings,
            };
        }

        // An events-mode item makes this an event response; the first
        // valid one wins and any others are reported, not merged.
        let events_item = validated
            .items
            .iter()
            .find(|i| i.valid && i.mode == ExecutionMode::Events);
        if let Some(item) = events_item {
            let extra = validated
                .items
                .iter()
                .filter(|i| i.valid && !std::ptr::eq(*i, item))
                .count();
            if extra > 0 {
                warnings.push(format!("{extra} additional item(s) ignored in event mode"));
            }
            let executor = EventExecutor::new(&self.catalog, self.storage.as_ref());
            return match executor.execute(item).await {
                Ok(outcome) => {
                    warnings.extend(outcome.warnings);
                    Response::Events {
                        geojson: geolens_protocol::FeatureCollection::new(outcome.features),
                        time_data: outcome.time_data,
                        time_range: outcome.time_range,
                        granularity: outcome.granularity,
                        summary: summary.unwrap_or(outcome.summary),
                        warnings,
                    }
                }
                Err(err) => {
                    log::warn!("event execution failed: {err}");
                    Response::chat(format!("Event data could not be loaded: {err}"))
                }
            };
        }

        let executor = AggregateExecutor::new(&self.catalog, self.storage.as_ref());
        match executor.execute(&validated.items, &validated.derived).await {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                Response::Order {
                    order: OrderPayload {
                        items: validated.items,
                        derived: validated.derived,
                    },
                    geojson: Some(outcome.geojson),
                    summary,
                    warnings,
                }
            }
            Err(err) => {
                log::warn!("aggregate execution failed: {err}");
                Response::chat(format!("The requested tables could not be read: {err}"))
            }
        }
    }
}
