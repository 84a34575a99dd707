use crate::error::{Error, Result};
use crate::model::downloader::{MODEL_FILE, TOKENIZER_FILE};
use candle_core::{Device, Tensor, D};
use ort::session::Session;
use ort::value::Tensor as OrtTensor;
use serde::Serialize;
use std::path::Path;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

const MAX_LENGTH: usize = 512;

/// A binary text classifier backed by an exported transformer graph.
///
/// The graph takes `input_ids` and `attention_mask` (plus `token_type_ids`
/// when it declares them) and returns logits of shape `[batch, labels]`.
pub struct TransformerClassifier {
    model: String,
    size: String,
    labels: Vec<String>,
    session: Session,
    tokenizer: Tokenizer,
    feeds_token_types: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
    pub scores: Vec<(String, f32)>,
}

impl TransformerClassifier {
    pub fn load(model_dir: &Path, model: &str, size: &str, labels: &[&str]) -> Result<Self> {
        tracing::info!("Loading classifier from: {:?}", model_dir);

        let model_path = model_dir.join(MODEL_FILE);
        let session = Session::builder()
            .map_err(|e| Error::ModelLoadFailed(format!("Failed to create session: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::ModelLoadFailed(format!("Failed to load graph: {}", e)))?;

        let feeds_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::ModelLoadFailed(format!("Failed to load tokenizer: {}", e)))?;

        if tokenizer.get_truncation().is_none() {
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: MAX_LENGTH,
                    ..Default::default()
                }))
                .map_err(|e| Error::ModelLoadFailed(format!("Failed to set truncation: {}", e)))?;
        }
        if tokenizer.get_padding().is_none() {
            tokenizer.with_padding(Some(PaddingParams::default()));
        }

        tracing::info!("Classifier loaded successfully");
        tracing::info!("  Model: {} ({})", model, size);
        tracing::info!("  Labels: {:?}", labels);

        Ok(Self {
            model: model.to_string(),
            size: size.to_string(),
            labels: labels.iter().map(|label| label.to_string()).collect(),
            session,
            tokenizer,
            feeds_token_types,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// One probability row per text, columns in label order.
    pub fn predict_proba(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(Error::InvalidInput("Empty input texts".to_string()));
        }

        tracing::debug!("Classifying {} texts", texts.len());

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::ClassificationError(format!("Tokenization failed: {}", e)))?;

        let batch_size = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|encoding| encoding.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &type_id) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = type_id as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let tensor = |data: Vec<i64>| {
            OrtTensor::from_array((shape, data.into_boxed_slice())).map_err(|e| {
                Error::ClassificationError(format!("Failed to create input tensor: {}", e))
            })
        };
        let ids_tensor = tensor(input_ids)?;
        let mask_tensor = tensor(attention_mask)?;

        let outputs = if self.feeds_token_types {
            let type_tensor = tensor(token_type_ids)?;
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
        } else {
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])
        };
        let outputs = outputs
            .map_err(|e| Error::ClassificationError(format!("Graph execution failed: {}", e)))?;

        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::ClassificationError(format!("Failed to read logits: {}", e)))?;
        let dims: &[i64] = output_shape;

        if dims.len() != 2 || dims[0] as usize != batch_size || dims[1] as usize != self.labels.len() {
            return Err(Error::ClassificationError(format!(
                "unexpected logits shape {:?}, expected [{}, {}]",
                dims,
                batch_size,
                self.labels.len()
            )));
        }

        softmax_rows(output_data.to_vec(), batch_size, self.labels.len())
    }

    pub fn predict(&mut self, texts: &[String]) -> Result<Vec<Prediction>> {
        let probabilities = self.predict_proba(texts)?;
        Ok(probabilities
            .into_iter()
            .map(|row| best_label(&self.labels, row))
            .collect())
    }
}

fn softmax_rows(logits: Vec<f32>, rows: usize, cols: usize) -> Result<Vec<Vec<f32>>> {
    let logits = Tensor::from_vec(logits, (rows, cols), &Device::Cpu)?;
    let probabilities = candle_nn::ops::softmax(&logits, D::Minus1)?;
    Ok(probabilities.to_vec2::<f32>()?)
}

fn best_label(labels: &[String], probabilities: Vec<f32>) -> Prediction {
    let (best, score) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::MIN), |acc, (idx, p)| if p > acc.1 { (idx, p) } else { acc });

    Prediction {
        label: labels[best].clone(),
        score,
        scores: labels.iter().cloned().zip(probabilities).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["negative".to_string(), "positive".to_string()]
    }

    #[test]
    fn softmax_rows_are_distributions() {
        let rows = softmax_rows(vec![0.0, 0.0, 2.0, -1.0, -3.0, 4.0], 3, 2).unwrap();

        assert_eq!(rows.len(), 3);
        for row in &rows {
            let total: f32 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-5, "row sums to {}", total);
        }
        assert!((rows[0][0] - 0.5).abs() < 1e-6);
        assert!(rows[1][0] > rows[1][1]);
        assert!(rows[2][1] > 0.99);
    }

    #[test]
    fn softmax_rejects_mismatched_shape() {
        let err = softmax_rows(vec![1.0, 2.0, 3.0], 2, 2).unwrap_err();
        assert!(matches!(err, Error::ClassificationError(_)));
    }

    #[test]
    fn best_label_picks_highest_probability() {
        let prediction = best_label(&labels(), vec![0.2, 0.8]);

        assert_eq!(prediction.label, "positive");
        assert_eq!(prediction.score, 0.8);
        assert_eq!(
            prediction.scores,
            vec![("negative".to_string(), 0.2), ("positive".to_string(), 0.8)]
        );
    }

    #[test]
    fn best_label_prefers_first_label_on_tie() {
        let prediction = best_label(&labels(), vec![0.5, 0.5]);
        assert_eq!(prediction.label, "negative");
    }
}
