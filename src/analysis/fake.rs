use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{AnalysisBridge, AnalysisUnavailable, EncodedImage, FoodAnalysis};

/// Bridge that replays queued outcomes in order. With a gate set, each call
/// signals `started` and then waits for `release` before answering.
#[derive(Default)]
pub struct ScriptedBridge {
    outcomes: Mutex<VecDeque<Result<FoodAnalysis, String>>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedBridge {
    pub fn new(outcomes: impl IntoIterator<Item = Result<FoodAnalysis, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            gate: None,
        }
    }

    pub fn gated(mut self, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some((started, release));
        self
    }
}

pub fn salad() -> FoodAnalysis {
    FoodAnalysis {
        food_name: "Greek salad".into(),
        calories: 320.0,
        protein: 9.0,
        carbs: 14.0,
        fats: 25.0,
        confidence: 0.9,
        description: "Tomato, cucumber, feta, olives".into(),
    }
}

#[async_trait]
impl AnalysisBridge for ScriptedBridge {
    async fn analyze(&self, _image: &EncodedImage) -> Result<FoodAnalysis, AnalysisUnavailable> {
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        match self.outcomes.lock().await.pop_front() {
            Some(Ok(analysis)) => Ok(analysis),
            Some(Err(reason)) => Err(AnalysisUnavailable::new(reason)),
            None => Err(AnalysisUnavailable::new("script exhausted")),
        }
    }
}
