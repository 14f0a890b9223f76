//! T5 summarisation backend on candle.
//!
//! Model files (`config.json`, `tokenizer.json`, `model.safetensors`) are
//! resolved through the Hugging Face hub cache, so the first load downloads
//! them and later loads are offline. Weights are memory-mapped.
//!
//! The decoder runs without a KV cache: beams diverge after every step, so
//! each call re-feeds the beam's whole prefix.

use crate::config::{ComputeDevice, PipelineConfig};
use crate::error::PdfSumError;
use crate::pipeline::summarize::{SpecialTokens, SummaryBackend};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use std::path::PathBuf;
use tokenizers::Tokenizer;
use tracing::{debug, info};

pub struct T5Backend {
    model: t5::T5ForConditionalGeneration,
    tokenizer: Tokenizer,
    device: Device,
    special: SpecialTokens,
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl T5Backend {
    /// Fetch and load `config.model_id` at `config.model_revision`.
    pub fn load(config: &PipelineConfig) -> Result<Self, PdfSumError> {
        let model_id = config.model_id.as_str();
        let load_err = |detail: String| PdfSumError::ModelLoad {
            model_id: model_id.to_string(),
            detail,
        };

        let device = resolve_device(config.device).map_err(|e| load_err(e.to_string()))?;
        info!("Loading summarisation model {} on {:?}", model_id, device);

        let files = fetch_files(config).map_err(load_err)?;

        let raw_config = std::fs::read_to_string(&files.config)
            .map_err(|e| load_err(format!("{}: {e}", files.config.display())))?;
        let mut model_config: t5::Config = serde_json::from_str(&raw_config)
            .map_err(|e| load_err(format!("config.json: {e}")))?;
        model_config.use_cache = false;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| load_err(format!("tokenizer.json: {e}")))?;

        // SAFETY: the safetensors file lives in the hub cache and is not
        // modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, &device)
        }
        .map_err(|e| load_err(format!("model.safetensors: {e}")))?;
        let model = t5::T5ForConditionalGeneration::load(vb, &model_config)
            .map_err(|e| load_err(e.to_string()))?;

        let special = SpecialTokens {
            decoder_start: model_config
                .decoder_start_token_id
                .unwrap_or(model_config.pad_token_id) as u32,
            eos: model_config.eos_token_id as u32,
            pad: model_config.pad_token_id as u32,
        };
        debug!("Special tokens: {:?}", special);

        Ok(Self {
            model,
            tokenizer,
            device,
            special,
        })
    }
}

fn resolve_device(device: ComputeDevice) -> candle_core::Result<Device> {
    match device {
        ComputeDevice::Auto => Device::cuda_if_available(0),
        ComputeDevice::Cpu => Ok(Device::Cpu),
        ComputeDevice::Cuda(ordinal) => Device::new_cuda(ordinal),
    }
}

fn fetch_files(config: &PipelineConfig) -> Result<ModelFiles, String> {
    let mut builder = ApiBuilder::new().with_progress(false);
    if let Some(dir) = &config.model_cache_dir {
        builder = builder.with_cache_dir(dir.clone());
    }
    let api = builder.build().map_err(|e| format!("hub client: {e}"))?;
    let repo = api.repo(Repo::with_revision(
        config.model_id.clone(),
        RepoType::Model,
        config.model_revision.clone(),
    ));

    let get = |name: &str| repo.get(name).map_err(|e| format!("{name}: {e}"));
    let files = ModelFiles {
        config: get("config.json")?,
        tokenizer: get("tokenizer.json")?,
        weights: get("model.safetensors")?,
    };
    debug!("Model weights at {}", files.weights.display());
    Ok(files)
}

impl SummaryBackend for T5Backend {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, PdfSumError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| PdfSumError::Generation(format!("tokenization: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn detokenize(&self, ids: &[u32]) -> Result<String, PdfSumError> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| PdfSumError::Generation(format!("detokenization: {e}")))
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    fn encode(&mut self, input_ids: &[u32]) -> Result<Tensor, PdfSumError> {
        let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        Ok(self.model.encode(&input)?)
    }

    fn next_token_logits(
        &mut self,
        encoder_output: &Tensor,
        decoder_prefix: &[u32],
    ) -> Result<Vec<f32>, PdfSumError> {
        let decoder_input = Tensor::new(decoder_prefix, &self.device)?.unsqueeze(0)?;
        let logits = self.model.decode(&decoder_input, encoder_output)?;
        Ok(logits.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_device_always_resolves() {
        assert!(matches!(resolve_device(ComputeDevice::Cpu), Ok(Device::Cpu)));
    }

    #[test]
    fn unknown_model_is_model_load_error() {
        let cache = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .model_id("this-org-does-not-exist/nor-this-model")
            .model_cache_dir(cache.path())
            .device(ComputeDevice::Cpu)
            .build()
            .unwrap();
        match T5Backend::load(&config) {
            Err(PdfSumError::ModelLoad { model_id, .. }) => {
                assert_eq!(model_id, "this-org-does-not-exist/nor-this-model")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("loading a nonexistent model succeeded"),
        }
    }
}
