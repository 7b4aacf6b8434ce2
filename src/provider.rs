//! Evidence acquisition boundary.
//!
//! Document collection, keyword extraction and job-posting classification all
//! live upstream; this crate only consumes their output. [`EvidenceProvider`]
//! is the seam: production wires a real collector behind it, tests and the
//! demo binary use deterministic fixtures.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::evidence::{AssessmentInput, ReferencePopulation};

/// Hands the pipeline pre-extracted assessment inputs and the historical
/// reference population the confidence model is fitted on.
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Assessment input for one company. Errors when the company is unknown
    /// or evidence cannot be assembled; the runner records the failure and
    /// moves on to the next company.
    async fn assessment_for(&self, company_id: &str) -> anyhow::Result<AssessmentInput>;

    /// Historical scored assessments, fetched once per batch run.
    async fn reference_population(&self) -> anyhow::Result<ReferencePopulation>;

    /// Map an exchange ticker to a company id, `None` when untracked.
    async fn resolve_ticker(&self, ticker: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, Deserialize)]
struct PortfolioEntry {
    ticker: String,
    assessment: AssessmentInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Portfolio {
    #[serde(default)]
    reference: ReferencePopulation,
    #[serde(default)]
    companies: Vec<PortfolioEntry>,
}

/// Provider backed by a static JSON portfolio. Same shape the demo fixture
/// uses; tests feed their own JSON through [`from_json_str`].
///
/// [`from_json_str`]: FixtureEvidenceProvider::from_json_str
pub struct FixtureEvidenceProvider {
    by_company: BTreeMap<String, AssessmentInput>,
    by_ticker: BTreeMap<String, String>,
    reference: ReferencePopulation,
}

impl FixtureEvidenceProvider {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let portfolio: Portfolio = serde_json::from_str(raw)?;
        let mut by_company = BTreeMap::new();
        let mut by_ticker = BTreeMap::new();
        for entry in portfolio.companies {
            by_ticker.insert(
                entry.ticker.to_ascii_uppercase(),
                entry.assessment.company_id.clone(),
            );
            by_company.insert(entry.assessment.company_id.clone(), entry.assessment);
        }
        Ok(Self {
            by_company,
            by_ticker,
            reference: portfolio.reference,
        })
    }

    /// The portfolio embedded at compile time.
    #[cfg(feature = "demo-fixtures")]
    pub fn embedded() -> Self {
        let raw = include_str!("../tests/fixtures/portfolio.json");
        Self::from_json_str(raw).expect("valid embedded portfolio fixture")
    }

    /// Provider with no companies and no reference data. Every scoring
    /// request fails cleanly; used when the binary is built without
    /// `demo-fixtures` and no real collector is wired in.
    pub fn empty() -> Self {
        Self {
            by_company: BTreeMap::new(),
            by_ticker: BTreeMap::new(),
            reference: ReferencePopulation::default(),
        }
    }

    pub fn company_ids(&self) -> Vec<String> {
        self.by_company.keys().cloned().collect()
    }
}

#[async_trait]
impl EvidenceProvider for FixtureEvidenceProvider {
    fn name(&self) -> &'static str {
        "fixture-portfolio"
    }

    async fn assessment_for(&self, company_id: &str) -> anyhow::Result<AssessmentInput> {
        self.by_company
            .get(company_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no evidence for company '{company_id}'"))
    }

    async fn reference_population(&self) -> anyhow::Result<ReferencePopulation> {
        Ok(self.reference.clone())
    }

    async fn resolve_ticker(&self, ticker: &str) -> anyhow::Result<Option<String>> {
        Ok(self.by_ticker.get(&ticker.to_ascii_uppercase()).cloned())
    }
}
