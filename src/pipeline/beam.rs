//! Beam search over a step function that scores the next token.
//!
//! The search is model-agnostic: the caller supplies a closure mapping a
//! decoder prefix (starting with the decoder start token) to raw next-token
//! logits over the vocabulary. Scores are accumulated log-probabilities;
//! finished hypotheses are ranked by `score / generated_len^length_penalty`.
//!
//! Ties are broken by beam order then token id, so a given model and input
//! always produce the same output.

use crate::config::PipelineConfig;
use crate::error::PdfSumError;
use std::cmp::Ordering;
use tracing::debug;

/// Knobs for [`beam_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct BeamParams {
    pub num_beams: usize,
    /// Upper bound on generated tokens, the decoder start token excluded.
    pub max_new_tokens: usize,
    /// EOS is forbidden until this many tokens have been generated.
    pub min_new_tokens: usize,
    /// Stop as soon as `num_beams` hypotheses have finished.
    pub early_stopping: bool,
    pub length_penalty: f32,
    /// 0 disables n-gram blocking.
    pub no_repeat_ngram_size: usize,
}

impl Default for BeamParams {
    fn default() -> Self {
        BeamParams::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for BeamParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            num_beams: config.num_beams.max(1),
            max_new_tokens: config.max_summary_tokens,
            min_new_tokens: config.min_summary_tokens,
            early_stopping: config.early_stopping,
            length_penalty: config.length_penalty,
            no_repeat_ngram_size: config.no_repeat_ngram_size,
        }
    }
}

#[derive(Debug, Clone)]
struct Hypothesis {
    /// Decoder start token followed by generated tokens.
    tokens: Vec<u32>,
    score: f32,
}

#[derive(Debug, Clone)]
struct Finished {
    /// Generated tokens only, EOS included when the hypothesis ended on it.
    tokens: Vec<u32>,
    normalized: f32,
}

/// The `num_beams` best finished hypotheses seen so far.
struct FinishedSet {
    capacity: usize,
    length_penalty: f32,
    items: Vec<Finished>,
}

impl FinishedSet {
    fn new(capacity: usize, length_penalty: f32) -> Self {
        Self {
            capacity,
            length_penalty,
            items: Vec::with_capacity(capacity + 1),
        }
    }

    fn normalize(&self, score: f32, len: usize) -> f32 {
        score / (len.max(1) as f32).powf(self.length_penalty)
    }

    fn add(&mut self, tokens: Vec<u32>, score: f32) {
        let normalized = self.normalize(score, tokens.len());
        self.items.push(Finished { tokens, normalized });
        // Stable sort keeps earlier (higher-ranked) insertions first on ties.
        self.items
            .sort_by(|a, b| b.normalized.total_cmp(&a.normalized));
        self.items.truncate(self.capacity);
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn worst(&self) -> Option<f32> {
        self.items.last().map(|f| f.normalized)
    }

    fn best(self) -> Option<Vec<u32>> {
        self.items.into_iter().next().map(|f| f.tokens)
    }
}

/// Run beam search and return the generated tokens of the best hypothesis.
///
/// The result never contains `decoder_start` and has at most
/// `params.max_new_tokens` tokens. `step` is called once per live beam per
/// generation step with the full decoder prefix.
pub fn beam_search<F>(
    decoder_start: u32,
    eos: u32,
    params: &BeamParams,
    mut step: F,
) -> Result<Vec<u32>, PdfSumError>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>, PdfSumError>,
{
    let num_beams = params.num_beams.max(1);
    let mut finished = FinishedSet::new(num_beams, params.length_penalty);
    let mut beams = vec![Hypothesis {
        tokens: vec![decoder_start],
        score: 0.0,
    }];

    let mut done = false;
    for generated in 0..params.max_new_tokens {
        // (score, beam index, token)
        let mut candidates: Vec<(f32, usize, u32)> = Vec::new();

        for (beam_idx, beam) in beams.iter().enumerate() {
            let logits = step(&beam.tokens)?;
            let mut logprobs = log_softmax(&logits)?;

            if generated < params.min_new_tokens {
                if let Some(lp) = logprobs.get_mut(eos as usize) {
                    *lp = f32::NEG_INFINITY;
                }
            }
            for banned in banned_tokens(&beam.tokens, params.no_repeat_ngram_size) {
                if let Some(lp) = logprobs.get_mut(banned as usize) {
                    *lp = f32::NEG_INFINITY;
                }
            }

            for (token, lp) in top_k(&logprobs, 2 * num_beams) {
                candidates.push((beam.score + lp, beam_idx, token));
            }
        }

        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });
        candidates.truncate(2 * num_beams);

        let mut next: Vec<Hypothesis> = Vec::with_capacity(num_beams);
        for (rank, &(score, beam_idx, token)) in candidates.iter().enumerate() {
            let parent = &beams[beam_idx];
            if token == eos {
                // An EOS outside the top `num_beams` would displace a
                // better live continuation.
                if rank < num_beams {
                    let mut tokens = parent.tokens[1..].to_vec();
                    tokens.push(eos);
                    finished.add(tokens, score);
                }
                continue;
            }
            let mut tokens = parent.tokens.clone();
            tokens.push(token);
            next.push(Hypothesis { tokens, score });
            if next.len() == num_beams {
                break;
            }
        }

        if next.is_empty() {
            debug!("Beam search exhausted after {} tokens", generated + 1);
            break;
        }
        beams = next;

        if finished.is_full() {
            if params.early_stopping {
                debug!("Beam search stopped early after {} tokens", generated + 1);
                done = true;
                break;
            }
            // No live beam can still overtake the worst finished hypothesis.
            let best_live = beams[0].score;
            let live_len = generated + 1;
            let best_possible = finished.normalize(best_live, live_len);
            if finished.worst().is_some_and(|w| w >= best_possible) {
                debug!("Beam search converged after {} tokens", live_len);
                done = true;
                break;
            }
        }
    }

    // Hypotheses still alive at the length limit compete with finished ones.
    if !done {
        for beam in beams {
            finished.add(beam.tokens[1..].to_vec(), beam.score);
        }
    }

    finished
        .best()
        .ok_or_else(|| PdfSumError::Generation("beam search produced no hypothesis".into()))
}

fn log_softmax(logits: &[f32]) -> Result<Vec<f32>, PdfSumError> {
    let max = logits
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Err(PdfSumError::Generation(format!(
            "model returned no finite logits over {} tokens",
            logits.len()
        )));
    }
    let sum: f32 = logits.iter().map(|&x| (x - max).exp()).sum();
    let log_norm = max + sum.ln();
    Ok(logits.iter().map(|&x| x - log_norm).collect())
}

/// The `k` best finite entries, best first, lower token id first on ties.
fn top_k(logprobs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut scored: Vec<(u32, f32)> = logprobs
        .iter()
        .enumerate()
        .filter(|(_, lp)| lp.is_finite())
        .map(|(i, &lp)| (i as u32, lp))
        .collect();

    let by_score = |a: &(u32, f32), b: &(u32, f32)| -> Ordering {
        b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
    };
    if scored.len() > k && k > 0 {
        scored.select_nth_unstable_by(k - 1, by_score);
        scored.truncate(k);
    }
    scored.sort_by(by_score);
    scored.truncate(k);
    scored
}

/// Tokens that would complete an n-gram already present in `tokens`.
fn banned_tokens(tokens: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || tokens.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() + 1 - n..];
    tokens
        .windows(n)
        .filter(|w| &w[..n - 1] == prefix)
        .map(|w| w[n - 1])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: u32 = 0;
    const EOS: u32 = 1;
    const VOCAB: usize = 8;

    /// Logits giving `probs` to the listed tokens and nothing to the rest.
    fn logits(probs: &[(u32, f32)]) -> Vec<f32> {
        let mut out = vec![f32::NEG_INFINITY; VOCAB];
        for &(tok, p) in probs {
            out[tok as usize] = p.ln();
        }
        out
    }

    fn params(num_beams: usize, max_new: usize) -> BeamParams {
        BeamParams {
            num_beams,
            max_new_tokens: max_new,
            min_new_tokens: 0,
            early_stopping: true,
            length_penalty: 0.0,
            no_repeat_ngram_size: 0,
        }
    }

    #[test]
    fn follows_scripted_sequence_to_eos() {
        let out = beam_search(START, EOS, &params(4, 10), |prefix| {
            Ok(match prefix.len() {
                1 => logits(&[(5, 0.9), (6, 0.1)]),
                2 => logits(&[(6, 0.9), (7, 0.1)]),
                3 => logits(&[(7, 0.9), (EOS, 0.1)]),
                _ => logits(&[(EOS, 0.99), (2, 0.01)]),
            })
        })
        .unwrap();
        assert_eq!(out, vec![5, 6, 7, EOS]);
    }

    #[test]
    fn beam_beats_greedy() {
        // Greedy takes 2 (0.6) then at best 0.6*0.35; the 3 → EOS path is 0.4*0.9.
        let out = beam_search(START, EOS, &params(2, 10), |prefix| {
            Ok(match prefix {
                [START] => logits(&[(2, 0.6), (3, 0.4)]),
                [START, 2] => logits(&[(EOS, 0.3), (4, 0.35), (5, 0.35)]),
                [START, 3] => logits(&[(EOS, 0.9), (4, 0.1)]),
                _ => logits(&[(EOS, 1.0)]),
            })
        })
        .unwrap();
        assert_eq!(out, vec![3, EOS]);
    }

    #[test]
    fn stops_at_max_new_tokens() {
        let out = beam_search(START, EOS, &params(4, 150), |prefix| {
            let t = 2 + (prefix.len() % 5) as u32;
            Ok(logits(&[(t, 0.6), (7, 0.4)]))
        })
        .unwrap();
        assert_eq!(out.len(), 150);
        assert!(!out.contains(&EOS));
    }

    #[test]
    fn eos_masked_until_min_length() {
        let mut p = params(2, 20);
        p.min_new_tokens = 5;
        let out = beam_search(START, EOS, &p, |_| Ok(logits(&[(EOS, 0.9), (4, 0.05), (5, 0.05)])))
            .unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(*out.last().unwrap(), EOS);
        assert!(!out[..5].contains(&EOS));
    }

    #[test]
    fn no_repeat_ngram_blocks_repeats() {
        let mut p = params(1, 12);
        p.no_repeat_ngram_size = 2;
        let out = beam_search(START, EOS, &p, |_| {
            Ok(logits(&[(3, 0.5), (4, 0.2), (5, 0.15), (6, 0.1), (7, 0.05)]))
        })
        .unwrap();
        let mut seen = std::collections::HashSet::new();
        let full: Vec<u32> = std::iter::once(START).chain(out.iter().copied()).collect();
        for w in full.windows(2) {
            assert!(seen.insert((w[0], w[1])), "bigram {:?} repeated in {:?}", w, out);
        }
    }

    #[test]
    fn ties_resolve_to_lower_token_id() {
        let out = beam_search(START, EOS, &params(1, 3), |prefix| {
            Ok(if prefix.len() == 1 {
                logits(&[(6, 0.5), (4, 0.5)])
            } else {
                logits(&[(EOS, 1.0)])
            })
        })
        .unwrap();
        assert_eq!(out, vec![4, EOS]);
    }

    #[test]
    fn without_early_stopping_still_terminates() {
        let mut p = params(2, 40);
        p.early_stopping = false;
        p.length_penalty = 1.0;
        let out = beam_search(START, EOS, &p, |prefix| {
            Ok(if prefix.len() < 4 {
                logits(&[(2, 0.5), (3, 0.4), (EOS, 0.1)])
            } else {
                logits(&[(EOS, 0.8), (4, 0.2)])
            })
        })
        .unwrap();
        assert!(out.len() <= 40);
        assert_eq!(*out.last().unwrap(), EOS);
    }

    #[test]
    fn early_stop_returns_finished_hypothesis() {
        // After step 2 two hypotheses have ended; the live [2, 4] scores
        // higher than both but never produced EOS.
        let out = beam_search(START, EOS, &params(2, 10), |prefix| {
            Ok(match prefix {
                [START] => logits(&[(2, 0.6), (EOS, 0.25), (3, 0.15)]),
                [START, 2] => logits(&[(4, 0.55), (EOS, 0.45)]),
                [START, 3] => logits(&[(5, 1.0)]),
                _ => logits(&[(4, 1.0)]),
            })
        })
        .unwrap();
        assert_eq!(out, vec![2, EOS]);
    }

    #[test]
    fn step_errors_propagate() {
        let err = beam_search(START, EOS, &params(2, 5), |_| {
            Err(PdfSumError::Generation("boom".into()))
        })
        .unwrap_err();
        assert!(matches!(err, PdfSumError::Generation(_)));
    }

    #[test]
    fn all_infinite_logits_is_generation_error() {
        let err = beam_search(START, EOS, &params(2, 5), |_| Ok(vec![f32::NEG_INFINITY; VOCAB]))
            .unwrap_err();
        assert!(matches!(err, PdfSumError::Generation(_)));
    }

    #[test]
    fn ngram_ban_list() {
        assert_eq!(banned_tokens(&[0, 3, 4, 3], 2), vec![4]);
        assert_eq!(banned_tokens(&[0, 3, 4, 3, 4], 3), vec![3]);
        assert!(banned_tokens(&[0, 3], 3).is_empty());
        assert!(banned_tokens(&[0, 3, 3], 0).is_empty());
    }
}
