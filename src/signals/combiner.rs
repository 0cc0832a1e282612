// =============================================================================
// Signal Combiner — weighted composite and recommendation classifier
// =============================================================================
//
// composite = Σ score_k × weight_k over the five analyzers.  Weights are used
// as configured: they need not sum to one and the composite is not clamped or
// re-normalised.
//
// Classification is an ordered chain, first match wins:
//   composite >= strong_buy   => STRONG BUY   (size 1.0)
//   composite >= buy          => BUY          (size 0.7)
//   composite <= strong_sell  => STRONG SELL  (size 1.0)
//   composite <= sell         => SELL         (size 0.7)
//   otherwise                 => NEUTRAL      (size 0.0)

use std::collections::BTreeMap;

use crate::analysis::AnalyzerKind;
use crate::config::{AnalysisConfig, SignalThresholds};
use crate::types::Recommendation;

/// Composite score plus the component breakdown that produced it.
#[derive(Debug, Clone)]
pub struct CombinedSignal {
    pub signal_strength: f64,
    pub recommendation: Recommendation,
    pub position_size: f64,
    pub components: BTreeMap<String, f64>,
}

/// Combine per-analyzer scores.  A kind missing from `scores` counts as 0.
pub fn combine(scores: &BTreeMap<AnalyzerKind, f64>, cfg: &AnalysisConfig) -> CombinedSignal {
    let mut components = BTreeMap::new();
    let mut total = 0.0;

    for kind in AnalyzerKind::ALL {
        let score = scores.get(&kind).copied().unwrap_or(0.0);
        total += score * kind.weight(cfg);
        components.insert(kind.component_name().to_string(), score);
    }

    let recommendation = classify(total, &cfg.signal);

    CombinedSignal {
        signal_strength: total,
        recommendation,
        position_size: recommendation.position_size(),
        components,
    }
}

/// Map a composite score onto a recommendation.
pub fn classify(score: f64, t: &SignalThresholds) -> Recommendation {
    if score >= t.strong_buy {
        Recommendation::StrongBuy
    } else if score >= t.buy {
        Recommendation::Buy
    } else if score <= t.strong_sell {
        Recommendation::StrongSell
    } else if score <= t.sell {
        Recommendation::Sell
    } else {
        Recommendation::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> SignalThresholds {
        SignalThresholds {
            strong_buy: 60.0,
            buy: 20.0,
            sell: -20.0,
            strong_sell: -60.0,
        }
    }

    #[test]
    fn classification_chain() {
        let t = thresholds();
        let cases = [
            (60.0, Recommendation::StrongBuy, 1.0),
            (25.0, Recommendation::Buy, 0.7),
            (0.0, Recommendation::Neutral, 0.0),
            (-30.0, Recommendation::Sell, 0.7),
            (-70.0, Recommendation::StrongSell, 1.0),
        ];
        for (score, rec, size) in cases {
            let got = classify(score, &t);
            assert_eq!(got, rec, "score {score}");
            assert_eq!(got.position_size(), size);
        }
    }

    #[test]
    fn boundaries_are_inclusive() {
        let t = thresholds();
        assert_eq!(classify(20.0, &t), Recommendation::Buy);
        assert_eq!(classify(-20.0, &t), Recommendation::Sell);
        assert_eq!(classify(-60.0, &t), Recommendation::StrongSell);
        assert_eq!(classify(19.999, &t), Recommendation::Neutral);
    }

    #[test]
    fn all_zero_is_neutral() {
        let cfg = AnalysisConfig::default();
        let out = combine(&BTreeMap::new(), &cfg);
        assert_eq!(out.signal_strength, 0.0);
        assert_eq!(out.recommendation, Recommendation::Neutral);
        assert_eq!(out.position_size, 0.0);
        assert_eq!(out.components.len(), 5);
        assert!(out.components.values().all(|v| *v == 0.0));
    }

    #[test]
    fn weights_are_not_renormalised() {
        let mut cfg = AnalysisConfig::default();
        cfg.technical.weight = 1.0;
        cfg.orderbook.weight = 1.0;
        let scores = BTreeMap::from([(AnalyzerKind::Technical, 80.0), (AnalyzerKind::OrderBook, 60.0)]);
        let out = combine(&scores, &cfg);
        assert!((out.signal_strength - 140.0).abs() < 1e-9);
        assert_eq!(out.recommendation, Recommendation::StrongBuy);
        assert_eq!(out.components["technical"], 80.0);
        assert_eq!(out.components["openInterest"], 0.0);
    }
}
