//! Competitor gap analysis: live search for market evidence, then an LLM pass
//! that structures it into a [`CompetitorAnalysis`].

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::ExtractionError;
use crate::llm::{ChatRequest, LlmClient, ResponseFormat};
use crate::schema::normalize::normalize_competitor_analysis;
use crate::schema::CompetitorAnalysis;
use crate::search::SearchProvider;

const NO_RESEARCH: &str = "No live research available; rely on your own knowledge of the market.";

const SYSTEM_PROMPT: &str = r#"You are a market intelligence expert. Analyze search data and answer with one JSON object using exactly these keys:
- "market_query": string describing the market that was researched
- "leaderboard": array ordered from strongest to weakest, each entry {"brand_name": string, "citation_count": integer >= 0, "top_sources": array of strings, "sentiment_score": number between 0 and 1}
- "citation_gaps": array of topics where competitors are cited and the client is not"#;

pub struct CompetitorResearcher {
    search: Arc<dyn SearchProvider>,
    client: Arc<dyn LlmClient>,
    model: String,
}

impl CompetitorResearcher {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            search,
            client,
            model: model.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn compare_brands(
        &self,
        client_brand: &str,
        competitors: &[String],
        niche: &str,
    ) -> Result<CompetitorAnalysis, ExtractionError> {
        info!("researching market");
        let query = research_query(client_brand, competitors, niche);
        let findings = match self.search.search(&query).await {
            Some(findings) => findings,
            None => {
                warn!("live research unavailable; continuing without it");
                NO_RESEARCH.to_string()
            }
        };

        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: format!(
                "Research:\n{findings}\n\nCreate a gap analysis for {client_brand} versus {} in the {niche} market.",
                competitors.join(", ")
            ),
            model: self.model.clone(),
            format: ResponseFormat::JsonObject,
        };
        let reply = self.client.complete(&request).await?;
        let analysis = normalize_competitor_analysis(&reply.into_json()?)?;
        info!(
            competitors = analysis.leaderboard.len(),
            gaps = analysis.citation_gaps.len(),
            "competitor analysis normalized"
        );
        Ok(analysis)
    }
}

fn research_query(client_brand: &str, competitors: &[String], niche: &str) -> String {
    format!(
        "Conduct competitive research in the {niche} industry. Compare {client_brand} against {}. \
         Highlight specific topics, keywords and features where competitors are mentioned more than {client_brand}.",
        competitors.join(", ")
    )
}
