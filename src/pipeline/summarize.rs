//! Abstractive summarisation with an encoder-decoder model.
//!
//! [`Summarizer`] owns a [`SummaryBackend`] (tokenizer + model) and the
//! generation limits. It is constructed explicitly, normally through
//! [`Summarizer::from_pretrained`], and reused for every call.
//!
//! Input handling: the configured prefix is prepended, the text is tokenised,
//! and anything past `max_input_tokens` is cut while keeping the trailing
//! end-of-sequence token. There is no chunking; text beyond the budget does
//! not influence the summary.

use crate::config::PipelineConfig;
use crate::error::PdfSumError;
use crate::pipeline::beam::{beam_search, BeamParams};
use crate::pipeline::t5::T5Backend;
use candle_core::Tensor;
use std::time::Instant;
use tracing::{debug, error, info};

/// Token ids the generation loop needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    /// First token fed to the decoder.
    pub decoder_start: u32,
    pub eos: u32,
    pub pad: u32,
}

/// A tokenizer and sequence-to-sequence model pair.
///
/// `encode` runs the encoder once per document; `next_token_logits` is then
/// called for each live beam at each step with the full decoder prefix.
pub trait SummaryBackend: Send {
    /// Tokenise `text`, appending the end-of-sequence token.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, PdfSumError>;

    /// Turn generated ids back into text, dropping special tokens.
    fn detokenize(&self, ids: &[u32]) -> Result<String, PdfSumError>;

    fn special_tokens(&self) -> SpecialTokens;

    /// Run the encoder over `input_ids`.
    fn encode(&mut self, input_ids: &[u32]) -> Result<Tensor, PdfSumError>;

    /// Unnormalised scores for the token following `decoder_prefix`.
    fn next_token_logits(
        &mut self,
        encoder_output: &Tensor,
        decoder_prefix: &[u32],
    ) -> Result<Vec<f32>, PdfSumError>;
}

/// Input budget plus beam search settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub input_prefix: String,
    pub max_input_tokens: usize,
    pub beam: BeamParams,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for GenerationParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            input_prefix: config.input_prefix.clone(),
            max_input_tokens: config.max_input_tokens.max(2),
            beam: BeamParams::from(config),
        }
    }
}

/// A loaded summarisation model.
pub struct Summarizer {
    backend: Box<dyn SummaryBackend>,
    params: GenerationParams,
}

impl Summarizer {
    pub fn new(backend: Box<dyn SummaryBackend>, params: GenerationParams) -> Self {
        Self { backend, params }
    }

    /// Fetch tokenizer and weights for `config.model_id` and load them on
    /// the configured device.
    pub fn from_pretrained(config: &PipelineConfig) -> Result<Self, PdfSumError> {
        let backend = T5Backend::load(config)?;
        Ok(Self::new(Box::new(backend), GenerationParams::from(config)))
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Summarise `text`, or return an empty string on failure.
    ///
    /// The cause is logged at `error` level.
    pub fn summarize(&mut self, text: &str) -> String {
        match self.try_summarize(text) {
            Ok(summary) => summary,
            Err(e) => {
                error!("Error summarizing text: {}", e);
                String::new()
            }
        }
    }

    /// Summarise `text`, returning the first error.
    pub fn try_summarize(&mut self, text: &str) -> Result<String, PdfSumError> {
        let start = Instant::now();
        let prompt = format!("{}{}", self.params.input_prefix, text);

        let ids = self.backend.tokenize(&prompt)?;
        let original_len = ids.len();
        let special = self.backend.special_tokens();
        let ids = truncate_input(ids, self.params.max_input_tokens, special.eos);
        if ids.len() < original_len {
            info!(
                "Input truncated from {} to {} tokens",
                original_len,
                ids.len()
            );
        }

        let encoder_output = self.backend.encode(&ids)?;
        let backend = &mut self.backend;
        let generated = beam_search(special.decoder_start, special.eos, &self.params.beam, |prefix| {
            backend.next_token_logits(&encoder_output, prefix)
        })?;

        let summary = self.backend.detokenize(&generated)?.trim().to_string();
        debug!(
            "Generated {} tokens ({} chars) in {}ms",
            generated.len(),
            summary.len(),
            start.elapsed().as_millis()
        );
        Ok(summary)
    }
}

/// Cut `ids` to at most `max_len` tokens, keeping a trailing `eos`.
pub fn truncate_input(mut ids: Vec<u32>, max_len: usize, eos: u32) -> Vec<u32> {
    if ids.len() <= max_len {
        return ids;
    }
    let ends_with_eos = ids.last() == Some(&eos);
    if ends_with_eos && max_len > 0 {
        ids.truncate(max_len - 1);
        ids.push(eos);
    } else {
        ids.truncate(max_len);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::sync::{Arc, Mutex};

    const SPECIAL: SpecialTokens = SpecialTokens {
        decoder_start: 0,
        eos: 1,
        pad: 0,
    };

    /// One token per whitespace-separated word (id = word length + 10).
    /// Generation emits `script` then EOS.
    struct ScriptedBackend {
        script: Vec<u32>,
        encoded_len: Arc<Mutex<Option<usize>>>,
    }

    impl SummaryBackend for ScriptedBackend {
        fn tokenize(&self, text: &str) -> Result<Vec<u32>, PdfSumError> {
            let mut ids: Vec<u32> = text
                .split_whitespace()
                .map(|w| w.len() as u32 + 10)
                .collect();
            ids.push(SPECIAL.eos);
            Ok(ids)
        }

        fn detokenize(&self, ids: &[u32]) -> Result<String, PdfSumError> {
            Ok(ids
                .iter()
                .filter(|&&id| id != SPECIAL.eos && id != SPECIAL.pad)
                .map(|id| format!("t{id}"))
                .collect::<Vec<_>>()
                .join(" "))
        }

        fn special_tokens(&self) -> SpecialTokens {
            SPECIAL
        }

        fn encode(&mut self, input_ids: &[u32]) -> Result<Tensor, PdfSumError> {
            *self.encoded_len.lock().unwrap() = Some(input_ids.len());
            Ok(Tensor::zeros((1, input_ids.len(), 4), DType::F32, &Device::Cpu)?)
        }

        fn next_token_logits(
            &mut self,
            _encoder_output: &Tensor,
            decoder_prefix: &[u32],
        ) -> Result<Vec<f32>, PdfSumError> {
            let mut logits = vec![-10.0f32; 64];
            let pos = decoder_prefix.len() - 1;
            let next = self.script.get(pos).copied().unwrap_or(SPECIAL.eos);
            logits[next as usize] = 10.0;
            Ok(logits)
        }
    }

    struct FailingBackend;

    impl SummaryBackend for FailingBackend {
        fn tokenize(&self, _text: &str) -> Result<Vec<u32>, PdfSumError> {
            Ok(vec![5, SPECIAL.eos])
        }
        fn detokenize(&self, _ids: &[u32]) -> Result<String, PdfSumError> {
            Ok(String::new())
        }
        fn special_tokens(&self) -> SpecialTokens {
            SPECIAL
        }
        fn encode(&mut self, _input_ids: &[u32]) -> Result<Tensor, PdfSumError> {
            Err(PdfSumError::Generation("encoder exploded".into()))
        }
        fn next_token_logits(
            &mut self,
            _encoder_output: &Tensor,
            _decoder_prefix: &[u32],
        ) -> Result<Vec<f32>, PdfSumError> {
            unreachable!("encode fails first")
        }
    }

    fn scripted(script: Vec<u32>) -> (Summarizer, Arc<Mutex<Option<usize>>>) {
        let encoded_len = Arc::new(Mutex::new(None));
        let backend = ScriptedBackend {
            script,
            encoded_len: Arc::clone(&encoded_len),
        };
        let params = GenerationParams {
            beam: BeamParams {
                min_new_tokens: 0,
                no_repeat_ngram_size: 0,
                ..BeamParams::default()
            },
            ..GenerationParams::default()
        };
        (Summarizer::new(Box::new(backend), params), encoded_len)
    }

    #[test]
    fn truncation_keeps_final_eos() {
        let ids: Vec<u32> = (10..2010).chain(std::iter::once(1)).collect();
        let out = truncate_input(ids, 1024, 1);
        assert_eq!(out.len(), 1024);
        assert_eq!(out[..1023], (10..1033).collect::<Vec<u32>>()[..]);
        assert_eq!(out[1023], 1);
    }

    #[test]
    fn truncation_without_eos_and_short_inputs() {
        assert_eq!(truncate_input(vec![5, 6, 7, 8], 2, 1), vec![5, 6]);
        assert_eq!(truncate_input(vec![5, 1], 1024, 1), vec![5, 1]);
    }

    #[test]
    fn long_input_truncated_before_encoding() {
        let (mut s, encoded_len) = scripted(vec![20, 21, 22]);
        let text = vec!["word"; 2000].join(" ");
        let summary = s.try_summarize(&text).unwrap();
        assert_eq!(*encoded_len.lock().unwrap(), Some(1024));
        assert_eq!(summary, "t20 t21 t22");
    }

    #[test]
    fn output_bounded_by_max_summary_tokens() {
        let (mut s, _) = scripted((0..400).map(|i| 20 + (i % 40)).collect());
        let summary = s.summarize("some text to summarise");
        let tokens = summary.split_whitespace().count();
        assert!(tokens > 0);
        assert!(tokens <= 150, "got {tokens} tokens");
    }

    #[test]
    fn backend_failure_yields_empty_string() {
        let mut s = Summarizer::new(Box::new(FailingBackend), GenerationParams::default());
        assert_eq!(s.summarize("anything"), "");
        assert!(matches!(
            s.try_summarize("anything"),
            Err(PdfSumError::Generation(_))
        ));
    }

    #[test]
    fn params_follow_config() {
        let config = PipelineConfig::builder()
            .num_beams(2)
            .max_summary_tokens(60)
            .min_summary_tokens(5)
            .input_prefix("")
            .build()
            .unwrap();
        let p = GenerationParams::from(&config);
        assert_eq!(p.beam.num_beams, 2);
        assert_eq!(p.beam.max_new_tokens, 60);
        assert_eq!(p.beam.min_new_tokens, 5);
        assert_eq!(p.input_prefix, "");
        assert_eq!(p.max_input_tokens, 1024);
    }
}
