mod bindings;

pub use bindings::PyTokenizer;

use pyo3::prelude::*;

use crate::core::MistralModel;

/// Mistral SentencePiece-BPE and Tekken tokenizers.
#[pymodule]
fn mistral_tokenizer(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTokenizer>()?;
    m.add("SUPPORTED_MODELS", MistralModel::supported_names().to_vec())?;
    Ok(())
}
