//! Agreement rules — how two miners' responses are judged to "agree".
//!
//! The quorum rule only counts mutually agreeing responses, so agreement
//! is the heart of the verdict. It is deliberately pluggable: string
//! equality of normalized evidence is the default, but nothing below the
//! aggregator assumes a specific comparator.

use attest_crypto::{blake2b_256, blake2b_256_multi};
use attest_messages::Evidence;
use attest_types::Claim;

/// Equivalence class of a response under an agreement rule. Responses
/// with equal buckets agree; the verdict is the first bucket to reach
/// quorum.
pub type Bucket = [u8; 32];

/// Assigns every admitted response to an agreement bucket.
pub trait AgreementRule: Send + Sync {
    fn bucket(&self, claim: &Claim, evidence: &[Evidence], confidence: f64) -> Bucket;

    /// Rule name for logs.
    fn name(&self) -> &str;
}

/// Default rule: hash of the normalized evidence payload.
///
/// Normalization is deliberately forgiving about formatting and
/// ordering — case is folded, whitespace collapsed, items sorted — so
/// two miners citing the same sources in a different order still agree.
/// It does not attempt semantic similarity.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvidenceHashRule;

impl EvidenceHashRule {
    fn normalize(evidence: &[Evidence]) -> Vec<String> {
        let mut items: Vec<String> = evidence
            .iter()
            .map(|e| {
                let url = e.url.trim().to_lowercase();
                let excerpt = e
                    .excerpt
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                format!("{url}|{excerpt}")
            })
            .collect();
        items.sort();
        items.dedup();
        items
    }
}

impl AgreementRule for EvidenceHashRule {
    fn bucket(&self, _claim: &Claim, evidence: &[Evidence], _confidence: f64) -> Bucket {
        let items = Self::normalize(evidence);
        let parts: Vec<&[u8]> = items.iter().map(|s| s.as_bytes()).collect();
        blake2b_256_multi(&parts)
    }

    fn name(&self) -> &str {
        "evidence-hash"
    }
}

/// Coarse rule: responses agree when they land on the same side of a
/// confidence threshold. Useful where miners return free-form evidence
/// that never hashes equal but their support/reject signal is what
/// matters.
#[derive(Clone, Copy, Debug)]
pub struct ConfidenceThresholdRule {
    pub threshold: f64,
}

impl AgreementRule for ConfidenceThresholdRule {
    fn bucket(&self, _claim: &Claim, _evidence: &[Evidence], confidence: f64) -> Bucket {
        if confidence >= self.threshold {
            blake2b_256(b"supported")
        } else {
            blake2b_256(b"unsupported")
        }
    }

    fn name(&self) -> &str {
        "confidence-threshold"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_types::Timestamp;

    fn claim() -> Claim {
        Claim::new("statement", vec![], 3, 30_000, Timestamp::from_millis(0))
    }

    fn ev(url: &str, excerpt: &str) -> Evidence {
        Evidence {
            url: url.into(),
            excerpt: excerpt.into(),
        }
    }

    #[test]
    fn formatting_differences_agree() {
        let rule = EvidenceHashRule;
        let a = rule.bucket(
            &claim(),
            &[ev("https://X.org/a", "The  Moon orbits\nthe Earth")],
            0.9,
        );
        let b = rule.bucket(
            &claim(),
            &[ev("  https://x.org/a ", "the moon orbits the earth")],
            0.2,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn item_order_does_not_matter() {
        let rule = EvidenceHashRule;
        let first = [ev("u1", "a"), ev("u2", "b")];
        let second = [ev("u2", "b"), ev("u1", "a")];
        assert_eq!(
            rule.bucket(&claim(), &first, 0.5),
            rule.bucket(&claim(), &second, 0.5)
        );
    }

    #[test]
    fn different_evidence_disagrees() {
        let rule = EvidenceHashRule;
        let a = rule.bucket(&claim(), &[ev("u1", "the moon is rock")], 0.5);
        let b = rule.bucket(&claim(), &[ev("u1", "the moon is cheese")], 0.5);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_evidence_is_its_own_bucket() {
        let rule = EvidenceHashRule;
        let empty = rule.bucket(&claim(), &[], 0.5);
        let nonempty = rule.bucket(&claim(), &[ev("u", "x")], 0.5);
        assert_ne!(empty, nonempty);
        assert_eq!(empty, rule.bucket(&claim(), &[], 0.1));
    }

    #[test]
    fn confidence_rule_splits_on_threshold() {
        let rule = ConfidenceThresholdRule { threshold: 0.7 };
        let high = rule.bucket(&claim(), &[], 0.71);
        let low = rule.bucket(&claim(), &[], 0.69);
        assert_ne!(high, low);
        assert_eq!(high, rule.bucket(&claim(), &[ev("u", "x")], 1.0));
    }
}
