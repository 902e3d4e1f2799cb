use serde::Serialize;

use crate::types::ComfortLevel;

pub const INITIAL_WEIGHTS: [f64; 3] = [0.02, 0.01, -0.5];
pub const LEARNING_RATE: f64 = 0.005;
const WEIGHT_LIMIT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStats {
    #[serde(rename = "predictionsMade")]
    pub predictions_made: u64,
    #[serde(rename = "feedbackCount")]
    pub feedback_count: u64,
    #[serde(rename = "tempWeight")]
    pub temp_weight: f64,
    #[serde(rename = "humidityWeight")]
    pub humidity_weight: f64,
    pub bias: f64,
    #[serde(rename = "learningRate")]
    pub learning_rate: f64,
}

/// Single perceptron mapping (temperature, humidity) to a comfort score in
/// `[0, 1]`, trained one feedback sample at a time.
#[derive(Debug, Clone)]
pub struct ComfortPredictor {
    weights: [f64; 3],
    learning_rate: f64,
    prediction_count: u64,
    feedback_count: u64,
}

impl Default for ComfortPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl ComfortPredictor {
    pub fn new() -> Self {
        Self::with_weights(INITIAL_WEIGHTS)
    }

    pub fn with_weights(weights: [f64; 3]) -> Self {
        Self {
            weights: weights.map(|weight| weight.clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT)),
            learning_rate: LEARNING_RATE,
            prediction_count: 0,
            feedback_count: 0,
        }
    }

    pub fn weights(&self) -> [f64; 3] {
        self.weights
    }

    pub fn prediction_count(&self) -> u64 {
        self.prediction_count
    }

    /// Piecewise-linear stand-in for a sigmoid: saturates at 0.01 / 0.99
    /// outside `[-5, 5]`, slope 1/10 inside.
    pub fn predict(&self, temp: f64, humidity: f64) -> f64 {
        let weighted_sum = temp * self.weights[0] + humidity * self.weights[1] + self.weights[2];

        if weighted_sum > 5.0 {
            0.99
        } else if weighted_sum < -5.0 {
            0.01
        } else {
            0.5 + weighted_sum / 10.0
        }
    }

    pub fn record_prediction(&mut self) {
        self.prediction_count = self.prediction_count.saturating_add(1);
    }

    /// One stochastic gradient step toward `target`. Returns `false` without
    /// touching the weights when the inputs cannot produce a finite update.
    pub fn learn(&mut self, temp: f64, humidity: f64, target: f64) -> bool {
        if !(temp.is_finite() && humidity.is_finite() && target.is_finite()) {
            return false;
        }

        let error = target - self.predict(temp, humidity);
        if !error.is_finite() {
            return false;
        }

        let step = self.learning_rate * error;
        self.weights[0] += step * temp;
        self.weights[1] += step * humidity;
        self.weights[2] += step;

        for weight in &mut self.weights {
            *weight = weight.clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT);
        }

        self.feedback_count = self.feedback_count.saturating_add(1);
        true
    }

    pub fn describe(comfort: f64) -> &'static str {
        ComfortLevel::from_score(comfort).as_str()
    }

    pub fn stats(&self) -> LearningStats {
        LearningStats {
            predictions_made: self.prediction_count,
            feedback_count: self.feedback_count,
            temp_weight: self.weights[0],
            humidity_weight: self.weights[1],
            bias: self.weights[2],
            learning_rate: self.learning_rate,
        }
    }
}
