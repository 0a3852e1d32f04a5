// tests/pipeline_e2e.rs
// Whole run over in-memory sources, a scripted classifier and a capturing
// synthesizer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use zeitgeist::analyze::{BatchClassifier, ClassificationResult, Classifier, ClassifyError};
use zeitgeist::enrich::{Catalyst, Disabled, EnrichmentSource, Headline, MacroObservation};
use zeitgeist::ingest::types::{Bet, NormalizedPrediction, SourceFetcher};
use zeitgeist::synth::{SynthesisInput, Synthesize};
use zeitgeist::{Pipeline, PipelineError};

struct Fixed {
    name: &'static str,
    prefix: &'static str,
    count: usize,
}

#[async_trait]
impl SourceFetcher for Fixed {
    async fn fetch(&self) -> Vec<NormalizedPrediction> {
        (0..self.count)
            .map(|i| NormalizedPrediction {
                id: format!("{}-{i}", self.prefix),
                title: format!("{} market {i}", self.name),
                bets: vec![Bet {
                    prompt: "Yes".into(),
                    probability: 0.5,
                }],
                url: None,
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Tags everything except `skip`; fails outright when `fail` is set.
struct Scripted {
    skip: &'static str,
    fail: bool,
}

#[async_trait]
impl Classifier for Scripted {
    async fn classify_batch(
        &self,
        batch: &[NormalizedPrediction],
    ) -> Result<Vec<ClassificationResult>> {
        if self.fail {
            bail!("503 from model");
        }
        Ok(batch
            .iter()
            .filter(|p| p.id != self.skip)
            .map(|p| ClassificationResult {
                id: p.id.clone(),
                topics: vec!["rates".into()],
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct Headlines;

#[async_trait]
impl EnrichmentSource for Headlines {
    type Item = Headline;

    fn name(&self) -> &'static str {
        "news"
    }

    async fn try_fetch(&self) -> Result<Vec<Headline>> {
        Ok(vec![Headline {
            title: "Fed holds rates".into(),
            description: None,
            url: None,
            published_at: None,
        }])
    }
}

struct BrokenCatalysts;

#[async_trait]
impl EnrichmentSource for BrokenCatalysts {
    type Item = Catalyst;

    fn name(&self) -> &'static str {
        "catalysts"
    }

    async fn try_fetch(&self) -> Result<Vec<Catalyst>> {
        bail!("model returned prose")
    }
}

#[derive(Default)]
struct Capture {
    seen: Mutex<Option<SynthesisInput>>,
    fail: bool,
}

struct Shared(Arc<Capture>);

#[async_trait]
impl Synthesize for Shared {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<String> {
        *self.0.seen.lock().unwrap() = Some(input.clone());
        if self.0.fail {
            bail!("context length exceeded");
        }
        Ok(format!("{} markets worth a look.", input.prediction_markets.len()))
    }
}

fn pipeline(classifier: Scripted, synth: Arc<Capture>) -> Pipeline {
    Pipeline {
        sources: vec![
            Box::new(Fixed {
                name: "kalshi",
                prefix: "kalshi",
                count: 3,
            }),
            Box::new(Fixed {
                name: "polymarket",
                prefix: "pm",
                count: 2,
            }),
        ],
        classifier: BatchClassifier::new(Arc::new(classifier), 2, Duration::from_millis(5)),
        news: Box::new(Headlines),
        macro_series: Box::new(Disabled::<MacroObservation>::new("fred")),
        catalysts: Box::new(BrokenCatalysts),
        synthesizer: Box::new(Shared(synth)),
    }
}

#[tokio::test]
async fn run_merges_filters_and_synthesizes() {
    let synth = Arc::new(Capture::default());
    let p = pipeline(
        Scripted {
            skip: "kalshi-1",
            fail: false,
        },
        synth.clone(),
    );

    let outcome = p.run().await.unwrap();

    let ids: Vec<_> = outcome.merged.iter().map(|m| m.prediction.id.as_str()).collect();
    assert_eq!(ids, vec!["kalshi-0", "kalshi-1", "kalshi-2", "pm-0", "pm-1"]);
    assert_eq!(outcome.merged.iter().filter(|m| m.is_classified()).count(), 4);
    assert!(outcome.merged[1].topics.is_none());
    assert_eq!(outcome.relevant, 4);
    assert_eq!(outcome.per_source, vec![("kalshi", 3), ("polymarket", 2)]);
    assert_eq!(outcome.narrative, "4 markets worth a look.");
    assert_eq!(outcome.sections, vec!["prediction_markets", "news_headlines"]);

    let seen = synth.seen.lock().unwrap().clone().expect("synthesizer called");
    assert_eq!(seen.prediction_markets.len(), 4);
    assert!(seen.macro_series.is_none());
    assert!(seen.upcoming_catalysts.is_none());
    assert_eq!(seen.news_headlines.as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn total_classification_failure_aborts_before_synthesis() {
    let synth = Arc::new(Capture::default());
    let p = pipeline(
        Scripted {
            skip: "",
            fail: true,
        },
        synth.clone(),
    );

    match p.run().await {
        Err(PipelineError::Classification(ClassifyError::NothingClassified { batches, failed })) => {
            assert_eq!(batches, 3);
            assert_eq!(failed, 3);
        }
        other => panic!("expected classification failure, got {other:?}"),
    }
    assert!(synth.seen.lock().unwrap().is_none());
}

#[tokio::test]
async fn synthesis_failure_is_fatal() {
    let synth = Arc::new(Capture {
        seen: Mutex::new(None),
        fail: true,
    });
    let p = pipeline(
        Scripted {
            skip: "",
            fail: false,
        },
        synth,
    );

    let err = p.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Synthesis(_)));
    assert!(err.to_string().contains("context length exceeded"));
}
